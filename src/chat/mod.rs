//! Chat orchestration: introduction flow, matchmaking triggers, and relay.

mod error;
mod service;

pub use error::ChatError;
pub use service::{ChatService, InboundOutcome, WELCOME_MESSAGE};
