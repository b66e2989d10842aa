//! Cloneable handle for communicating with a session actor.

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::api::{ChatMessage, OutboundEvent};
use crate::intro::Introduction;

use super::actor_types::{ActorError, ClaimOutcome, SessionCommand, SessionView};

/// Handle to a session actor.
///
/// Wraps the command channel with typed request/reply methods. A send or
/// reply failure means the actor task has stopped, reported uniformly as
/// [`ActorError::ActorShutdown`].
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    id: String,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<SessionCommand>, id: String) -> Self {
        Self { tx, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
    ) -> Result<R, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ActorError::ActorShutdown)?;
        reply_rx.await.map_err(|_| ActorError::ActorShutdown)
    }

    /// Append a user-authored message to the conversation log.
    pub async fn record_user_message(&self, text: String) -> Result<(), ActorError> {
        self.request(|reply| SessionCommand::RecordUserMessage { text, reply })
            .await?
    }

    /// Deliver a system-authored message to this session.
    pub async fn deliver_system(&self, text: String) -> Result<(), ActorError> {
        self.request(|reply| SessionCommand::DeliverSystem { text, reply })
            .await?
    }

    /// Deliver a message relayed from the chat partner.
    pub async fn deliver_partner(&self, text: String) -> Result<(), ActorError> {
        self.request(|reply| SessionCommand::DeliverPartner { text, reply })
            .await?
    }

    /// Record the completed introduction and move to waiting. Returns the
    /// completion notice delivered to the session.
    pub async fn complete_introduction(
        &self,
        introduction: Introduction,
    ) -> Result<String, ActorError> {
        self.request(|reply| SessionCommand::CompleteIntroduction {
            introduction,
            reply,
        })
        .await?
    }

    /// Atomically claim this session for a chat with `partner_id`.
    pub async fn try_claim(
        &self,
        partner_id: impl Into<String>,
        partner_first_name: impl Into<String>,
    ) -> Result<ClaimOutcome, ActorError> {
        let partner_id = partner_id.into();
        let partner_first_name = partner_first_name.into();
        self.request(|reply| SessionCommand::TryClaim {
            partner_id,
            partner_first_name,
            reply,
        })
        .await
    }

    /// Roll back a provisional claim. Returns true iff the session was
    /// chatting with `expected_partner` and has been returned to waiting.
    pub async fn release_claim(
        &self,
        expected_partner: impl Into<String>,
    ) -> Result<bool, ActorError> {
        let expected_partner = expected_partner.into();
        self.request(|reply| SessionCommand::ReleaseClaim {
            expected_partner,
            reply,
        })
        .await
    }

    /// Return a chatting session to the waiting state.
    pub async fn reset_to_waiting(&self) -> Result<(), ActorError> {
        self.request(|reply| SessionCommand::ResetToWaiting { reply })
            .await?
    }

    /// Snapshot of the session's current state.
    pub async fn view(&self) -> Result<SessionView, ActorError> {
        self.request(|reply| SessionCommand::GetView { reply }).await
    }

    /// Full conversation log.
    pub async fn conversation(&self) -> Result<Vec<ChatMessage>, ActorError> {
        self.request(|reply| SessionCommand::GetConversation { reply })
            .await
    }

    /// Subscribe to outbound events pushed to this session.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<OutboundEvent>, ActorError> {
        self.request(|reply| SessionCommand::Subscribe { reply })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_actor_reports_shutdown() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = SessionHandle::new(tx, "session_gone".to_string());

        let err = handle.view().await.unwrap_err();
        assert!(matches!(err, ActorError::ActorShutdown));
    }
}
