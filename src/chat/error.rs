//! Chat service errors.

use thiserror::Error;

use crate::matchmaking::MatchError;
use crate::session::ActorError;

/// Errors from chat orchestration.
///
/// All variants are recoverable from the session's perspective: the session
/// keeps its state and the client may retry. Collaborator failures never
/// appear here; they degrade inside the introduction flow.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No live session with this id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Message failed validation before any state changed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A session actor refused or could not process a command.
    #[error(transparent)]
    Actor(#[from] ActorError),

    /// Matchmaking failed.
    #[error(transparent)]
    Match(#[from] MatchError),
}
