//! Session actor types and protocol.
//!
//! This module defines the command protocol for communicating with session
//! actors, along with view and error types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

use crate::api::{ChatMessage, OutboundEvent, SessionState};
use crate::intro::Introduction;

// ============================================================================
// Session Command
// ============================================================================

/// Commands that can be sent to a session actor.
pub enum SessionCommand {
    // Conversation writes
    RecordUserMessage {
        text: String,
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    /// Append a system-authored message and push it to the transport channel.
    DeliverSystem {
        text: String,
        reply: oneshot::Sender<Result<(), ActorError>>,
    },
    /// Append a message relayed from the paired partner and push it outbound.
    DeliverPartner {
        text: String,
        reply: oneshot::Sender<Result<(), ActorError>>,
    },

    // State transitions
    CompleteIntroduction {
        introduction: Introduction,
        reply: oneshot::Sender<Result<String, ActorError>>,
    },
    /// Conditional transition into chatting: succeeds only while waiting.
    TryClaim {
        partner_id: String,
        partner_first_name: String,
        reply: oneshot::Sender<ClaimOutcome>,
    },
    /// Undo a provisional claim: reverts to waiting only if still paired
    /// with the expected partner.
    ReleaseClaim {
        expected_partner: String,
        reply: oneshot::Sender<bool>,
    },
    /// Partner-vanished fallback: chatting back to waiting.
    ResetToWaiting {
        reply: oneshot::Sender<Result<(), ActorError>>,
    },

    // Reads
    GetView {
        reply: oneshot::Sender<SessionView>,
    },
    GetConversation {
        reply: oneshot::Sender<Vec<ChatMessage>>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<OutboundEvent>>,
    },
}

/// Result of a conditional claim on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The session was waiting and is now chatting with the claimant.
    Claimed,
    /// The session already has a partner (possibly the claimant itself,
    /// when the symmetric attempt completed the pair first).
    AlreadyChatting { partner: String },
    /// The session is not in the waiting state (or refused a self-claim).
    NotWaiting,
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from actor operations.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The actor has shut down.
    #[error("actor has shut down")]
    ActorShutdown,

    /// Session not found.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The requested transition is not valid from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

// ============================================================================
// View
// ============================================================================

/// Point-in-time view of a session (returned by GetView).
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub state: SessionState,
    /// Present iff `state == Chatting`.
    pub partner_id: Option<String>,
    pub introduction: Option<Introduction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

// ============================================================================
// Constants
// ============================================================================

/// Channel capacity for commands.
///
/// If this fills up, callers block on send(), giving backpressure.
pub const CHANNEL_CAPACITY: usize = 64;

/// Capacity of the outbound broadcast channel. Slow SSE consumers that lag
/// past this many events miss the overwritten ones.
pub const OUTBOUND_CAPACITY: usize = 64;
