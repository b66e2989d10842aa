//! Shared API types used by both server handlers and clients.
//!
//! These types define the contract of the HTTP surface. Changes here affect
//! both sides, preventing silent drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ID prefix for sessions.
pub const SESSION_ID_PREFIX: &str = "session_";

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Collecting the user's introduction via the AI collaborator.
    Introduction,
    /// Introduction complete, advertised in the unpaired pool.
    Waiting,
    /// Paired; messages are relayed to the partner.
    Chatting,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Introduction => write!(f, "introduction"),
            SessionState::Waiting => write!(f, "waiting"),
            SessionState::Chatting => write!(f, "chatting"),
        }
    }
}

/// Provenance of a message, used to prevent self-echo loops: sessions never
/// react to system-authored messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    /// Typed by the session's own user.
    User,
    /// Relayed verbatim from the paired partner.
    Partner,
    /// Authored by the system (notifications, AI follow-ups).
    System,
}

/// A single entry in a session's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: crate::llm::Role,
    pub source: MessageSource,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: crate::llm::Role::User,
            source: MessageSource::User,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: crate::llm::Role::Assistant,
            source: MessageSource::System,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn partner(content: impl Into<String>) -> Self {
        Self {
            role: crate::llm::Role::Assistant,
            source: MessageSource::Partner,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }
}

/// An event pushed to the session's transport channel.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    pub source: MessageSource,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}
