//! LLM-backed implementation of the introduction collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::api::ChatMessage;
use crate::llm::{ChatRequest, LlmError, LlmProvider, Message, Role};

use super::{ExtractionOutcome, FollowUpResponder, Introduction, IntroductionExtractor};

const EXTRACTION_PROMPT: &str = "You read a chat conversation where a host collects a \
user's introduction. Respond with a single JSON object and nothing else, using exactly \
these keys: first_name (string or null), last_name (string or null), age (number or \
null), interests (array of strings). Use null for anything the user has not provided. \
Do not invent values.";

const FOLLOW_UP_PROMPT: &str = "You are a friendly chat host collecting a user's \
introduction before pairing them with a chat partner. Write one short message asking \
the user for the still-missing details listed below. Be warm, do not repeat questions \
they already answered.";

/// Both introduction collaborators backed by a chat completion provider.
pub struct LlmIntroducer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmIntroducer {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: String,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            provider,
            model,
            temperature,
            max_tokens,
        }
    }

    fn request(&self, system: &str, conversation: &[ChatMessage], suffix: Option<String>) -> ChatRequest {
        let mut messages = vec![Message::text(Role::System, system)];
        messages.extend(
            conversation
                .iter()
                .map(|m| Message::text(m.role, m.content.clone())),
        );
        if let Some(suffix) = suffix {
            messages.push(Message::text(Role::User, suffix));
        }
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl IntroductionExtractor for LlmIntroducer {
    async fn extract(&self, conversation: &[ChatMessage]) -> Result<ExtractionOutcome, LlmError> {
        let request = self.request(EXTRACTION_PROMPT, conversation, None);
        let response = self.provider.chat(request).await?;
        Ok(parse_extraction(&response.content()))
    }
}

#[async_trait]
impl FollowUpResponder for LlmIntroducer {
    async fn follow_up(
        &self,
        conversation: &[ChatMessage],
        missing: &[String],
    ) -> Result<String, LlmError> {
        let suffix = format!("[host note: still missing fields: {}]", missing.join(", "));
        let request = self.request(FOLLOW_UP_PROMPT, conversation, Some(suffix));
        let response = self.provider.chat(request).await?;
        Ok(response.content())
    }
}

// ============================================================================
// Extraction Parsing
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawIntroduction {
    first_name: Option<String>,
    last_name: Option<String>,
    age: Option<i64>,
    interests: Option<Vec<String>>,
}

/// Parse the model's extraction output.
///
/// Malformed output is treated as "nothing extracted", never an error: the
/// session simply stays in the introduction step and asks again.
fn parse_extraction(text: &str) -> ExtractionOutcome {
    let Some(json) = carve_json_object(text) else {
        debug!(output = %text, "extraction output had no JSON object");
        return ExtractionOutcome::Incomplete {
            missing: super::all_fields_missing(),
        };
    };

    let raw: RawIntroduction = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "failed to parse extraction JSON");
            return ExtractionOutcome::Incomplete {
                missing: super::all_fields_missing(),
            };
        }
    };

    let mut missing = Vec::new();

    let first_name = raw.first_name.filter(|s| !s.trim().is_empty());
    if first_name.is_none() {
        missing.push("first_name".to_string());
    }
    let last_name = raw.last_name.filter(|s| !s.trim().is_empty());
    if last_name.is_none() {
        missing.push("last_name".to_string());
    }
    let age = raw.age.filter(|a| (1..=150).contains(a));
    if age.is_none() {
        missing.push("age".to_string());
    }
    let interests: Vec<String> = raw
        .interests
        .unwrap_or_default()
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if interests.is_empty() {
        missing.push("interests".to_string());
    }

    if missing.is_empty() {
        ExtractionOutcome::Complete(Introduction {
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
            age: age.unwrap_or_default() as u8,
            interests,
        })
    } else {
        ExtractionOutcome::Incomplete { missing }
    }
}

/// Carve the outermost `{...}` span out of surrounding prose or code fences.
fn carve_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
