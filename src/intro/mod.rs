//! Introduction extraction collaborators.
//!
//! Before a user can be paired they go through an introduction step: an LLM
//! reads the conversation so far and fills a structured [`Introduction`]
//! record. Incomplete extractions carry the list of unresolved field names,
//! which steers the follow-up question asked next turn.

mod llm_introducer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::ChatMessage;
use crate::llm::LlmError;

pub use llm_introducer::LlmIntroducer;

/// Field names an introduction must fill before pairing.
pub const REQUIRED_FIELDS: [&str; 4] = ["first_name", "last_name", "age", "interests"];

/// All required fields, as an owned list. Used when a collaborator failure
/// is downgraded to "nothing extracted".
pub fn all_fields_missing() -> Vec<String> {
    REQUIRED_FIELDS.iter().map(|f| (*f).to_string()).collect()
}

/// A completed introduction record. Immutable once attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introduction {
    pub first_name: String,
    pub last_name: String,
    pub age: u8,
    pub interests: Vec<String>,
}

/// Result of running the extractor over a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// All required fields present and valid.
    Complete(Introduction),
    /// One or more fields unresolved; the session stays in introduction.
    Incomplete { missing: Vec<String> },
}

/// Extracts a structured introduction from free-form conversation.
#[async_trait]
pub trait IntroductionExtractor: Send + Sync {
    async fn extract(&self, conversation: &[ChatMessage]) -> Result<ExtractionOutcome, LlmError>;
}

/// Generates the natural-language follow-up asking for missing fields.
#[async_trait]
pub trait FollowUpResponder: Send + Sync {
    async fn follow_up(
        &self,
        conversation: &[ChatMessage],
        missing: &[String],
    ) -> Result<String, LlmError>;
}
