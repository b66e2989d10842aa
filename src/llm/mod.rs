//! LLM provider client for chat completions.

mod anthropic;
mod error;
mod provider;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::LlmError;
pub use provider::LlmProvider;
pub use types::{ChatRequest, ChatResponse, Choice, Message, Role, Usage};
