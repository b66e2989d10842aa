//! Per-session actor for serialized state mutations.
//!
//! Each session gets a dedicated actor task that serializes all mutations
//! via message passing (no locks). The actor owns the state machine, the
//! introduction record, and the conversation log.
//!
//! Unpaired-pool membership is synchronized in exactly one place,
//! [`SessionActor::set_phase`]: the session is a pool member iff its phase
//! is `Waiting`. Both sides of the sync are idempotent, so repeating a
//! transition to the same phase never changes membership.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

use crate::api::{ChatMessage, MessageSource, OutboundEvent, SessionState};
use crate::intro::Introduction;
use crate::matchmaking::UnpairedPool;

use super::actor_types::{
    ActorError, CHANNEL_CAPACITY, ClaimOutcome, OUTBOUND_CAPACITY, SessionCommand, SessionView,
};

// ============================================================================
// Phase
// ============================================================================

/// Internal state of the session state machine.
///
/// The partner id lives inside the `Chatting` variant so that "partner set
/// iff chatting" holds by construction.
#[derive(Debug, Clone)]
enum Phase {
    Introduction,
    Waiting,
    Chatting { partner_id: String },
}

// ============================================================================
// Session Actor
// ============================================================================

/// Per-session actor that owns state and handles mutations.
pub struct SessionActor {
    id: String,
    phase: Phase,
    introduction: Option<Introduction>,
    conversation: Vec<ChatMessage>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// Shared pool of unpaired sessions; membership follows `phase`.
    pool: Arc<UnpairedPool>,

    /// Push channel toward the transport layer.
    outbound_tx: broadcast::Sender<OutboundEvent>,

    command_rx: mpsc::Receiver<SessionCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionActor {
    /// Spawn a new session actor.
    ///
    /// Returns the command sender and a JoinHandle for the actor task.
    pub fn spawn(
        id: String,
        pool: Arc<UnpairedPool>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (mpsc::Sender<SessionCommand>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);
        let now = Utc::now();

        let actor = Self {
            id,
            phase: Phase::Introduction,
            introduction: None,
            conversation: Vec::new(),
            created_at: now,
            updated_at: now,
            pool,
            outbound_tx,
            command_rx: rx,
            shutdown_rx,
        };

        let handle = tokio::spawn(actor.run());
        (tx, handle)
    }

    /// Main actor loop.
    async fn run(mut self) {
        debug!(session_id = %self.id, "Session actor started");

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    // A closed channel counts as shutdown.
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        debug!(session_id = %self.id, "Session actor received shutdown signal");
                        break;
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!(session_id = %self.id, "All handles dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        // A stopped session must not linger in the pool.
        self.pool.remove(&self.id);
        debug!(session_id = %self.id, "Session actor stopped");
    }

    /// Handle a single command.
    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::RecordUserMessage { text, reply } => {
                self.record(ChatMessage::user(text));
                let _ = reply.send(Ok(()));
            }
            SessionCommand::DeliverSystem { text, reply } => {
                self.deliver(MessageSource::System, text);
                let _ = reply.send(Ok(()));
            }
            SessionCommand::DeliverPartner { text, reply } => {
                self.deliver(MessageSource::Partner, text);
                let _ = reply.send(Ok(()));
            }
            SessionCommand::CompleteIntroduction {
                introduction,
                reply,
            } => {
                let _ = reply.send(self.complete_introduction(introduction));
            }
            SessionCommand::TryClaim {
                partner_id,
                partner_first_name,
                reply,
            } => {
                let _ = reply.send(self.try_claim(partner_id, partner_first_name));
            }
            SessionCommand::ReleaseClaim {
                expected_partner,
                reply,
            } => {
                let _ = reply.send(self.release_claim(&expected_partner));
            }
            SessionCommand::ResetToWaiting { reply } => {
                let _ = reply.send(self.reset_to_waiting());
            }
            SessionCommand::GetView { reply } => {
                let _ = reply.send(self.view());
            }
            SessionCommand::GetConversation { reply } => {
                let _ = reply.send(self.conversation.clone());
            }
            SessionCommand::Subscribe { reply } => {
                let _ = reply.send(self.outbound_tx.subscribe());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// The single transition point. Pool membership is synchronized here:
    /// added iff the new phase is `Waiting`, removed otherwise. Both pool
    /// operations are idempotent, so repeated transitions to the same phase
    /// are membership no-ops.
    fn set_phase(&mut self, next: Phase) {
        match next {
            Phase::Waiting => self.pool.add(&self.id),
            Phase::Introduction | Phase::Chatting { .. } => self.pool.remove(&self.id),
        }
        self.updated_at = Utc::now();
        self.phase = next;
    }

    fn complete_introduction(&mut self, introduction: Introduction) -> Result<String, ActorError> {
        match &self.phase {
            Phase::Introduction => {
                let text = completion_notice(&introduction.first_name);
                self.introduction = Some(introduction);
                self.set_phase(Phase::Waiting);
                self.deliver(MessageSource::System, text.clone());
                Ok(text)
            }
            // Repeated completion is a no-op: membership re-synced, the
            // notice is not emitted a second time.
            Phase::Waiting => {
                self.set_phase(Phase::Waiting);
                let first_name = self
                    .introduction
                    .as_ref()
                    .map(|i| i.first_name.clone())
                    .unwrap_or_default();
                Ok(completion_notice(&first_name))
            }
            Phase::Chatting { .. } => Err(ActorError::InvalidTransition(
                "introduction already complete, session is chatting".to_string(),
            )),
        }
    }

    fn try_claim(&mut self, partner_id: String, partner_first_name: String) -> ClaimOutcome {
        if partner_id == self.id {
            return ClaimOutcome::NotWaiting;
        }

        match &self.phase {
            Phase::Waiting => {
                debug!(
                    session_id = %self.id,
                    partner_id = %partner_id,
                    "Claimed for chat"
                );
                self.set_phase(Phase::Chatting { partner_id });
                // One-time pairing notification, tied to the transition so a
                // symmetric concurrent attempt can never double-notify.
                self.deliver(
                    MessageSource::System,
                    format!("You're paired! Say hello to {partner_first_name}."),
                );
                ClaimOutcome::Claimed
            }
            Phase::Chatting { partner_id: current } => ClaimOutcome::AlreadyChatting {
                partner: current.clone(),
            },
            Phase::Introduction => ClaimOutcome::NotWaiting,
        }
    }

    fn release_claim(&mut self, expected_partner: &str) -> bool {
        match &self.phase {
            Phase::Chatting { partner_id } if partner_id == expected_partner => {
                debug!(
                    session_id = %self.id,
                    partner_id = %expected_partner,
                    "Releasing provisional claim"
                );
                self.set_phase(Phase::Waiting);
                self.deliver(
                    MessageSource::System,
                    "Your match fell through. Hold on, still looking for a partner.".to_string(),
                );
                true
            }
            _ => false,
        }
    }

    fn reset_to_waiting(&mut self) -> Result<(), ActorError> {
        match &self.phase {
            Phase::Chatting { .. } => {
                self.set_phase(Phase::Waiting);
                self.deliver(
                    MessageSource::System,
                    "Your partner left the chat. Looking for a new partner now.".to_string(),
                );
                Ok(())
            }
            Phase::Waiting => Ok(()),
            Phase::Introduction => Err(ActorError::InvalidTransition(
                "cannot wait for a partner before the introduction is complete".to_string(),
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Conversation
    // ------------------------------------------------------------------------

    fn record(&mut self, message: ChatMessage) {
        self.updated_at = Utc::now();
        self.conversation.push(message);
    }

    /// Append a non-user message to the log and push it to the transport
    /// channel. Send errors mean no subscriber is connected, which is fine.
    fn deliver(&mut self, source: MessageSource, text: String) {
        let message = match source {
            MessageSource::System => ChatMessage::system(text),
            MessageSource::Partner => ChatMessage::partner(text),
            MessageSource::User => ChatMessage::user(text),
        };
        let _ = self.outbound_tx.send(OutboundEvent {
            source,
            content: message.content.clone(),
            sent_at: message.sent_at,
        });
        self.record(message);
    }

    fn view(&self) -> SessionView {
        let (state, partner_id) = match &self.phase {
            Phase::Introduction => (SessionState::Introduction, None),
            Phase::Waiting => (SessionState::Waiting, None),
            Phase::Chatting { partner_id } => (SessionState::Chatting, Some(partner_id.clone())),
        };
        SessionView {
            id: self.id.clone(),
            state,
            partner_id,
            introduction: self.introduction.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.conversation.len(),
        }
    }
}

fn completion_notice(first_name: &str) -> String {
    format!("Nice to meet you, {first_name}! Hang tight while we find you a chat partner.")
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::session::SessionHandle;

    fn test_introduction(first_name: &str) -> Introduction {
        Introduction {
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            age: 30,
            interests: vec!["chess".to_string()],
        }
    }

    fn spawn_actor(id: &str, pool: &Arc<UnpairedPool>) -> (SessionHandle, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, _task) = SessionActor::spawn(id.to_string(), pool.clone(), shutdown_rx);
        (SessionHandle::new(tx, id.to_string()), shutdown_tx)
    }

    #[tokio::test]
    async fn new_session_starts_in_introduction() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);

        let view = handle.view().await.unwrap();
        assert_eq!(view.state, SessionState::Introduction);
        assert!(view.partner_id.is_none());
        assert!(!pool.contains("session_a"));
    }

    #[tokio::test]
    async fn completing_introduction_enters_pool() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);

        let notice = handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();
        assert!(notice.contains("Zoe"));

        let view = handle.view().await.unwrap();
        assert_eq!(view.state, SessionState::Waiting);
        assert!(pool.contains("session_a"));
    }

    #[tokio::test]
    async fn repeated_completion_is_idempotent() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);

        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();
        let before = handle.conversation().await.unwrap().len();

        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();

        assert_eq!(pool.list(), vec!["session_a".to_string()]);
        // No second completion notice.
        assert_eq!(handle.conversation().await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn claim_succeeds_only_while_waiting() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);

        // Still in introduction.
        let outcome = handle.try_claim("session_b", "Bea").await.unwrap();
        assert_eq!(outcome, ClaimOutcome::NotWaiting);

        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();

        let outcome = handle.try_claim("session_b", "Bea").await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
        assert!(!pool.contains("session_a"));

        // Second claim loses.
        let outcome = handle.try_claim("session_c", "Cal").await.unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::AlreadyChatting {
                partner: "session_b".to_string()
            }
        );

        let view = handle.view().await.unwrap();
        assert_eq!(view.state, SessionState::Chatting);
        assert_eq!(view.partner_id.as_deref(), Some("session_b"));
    }

    #[tokio::test]
    async fn self_claim_is_refused() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);
        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();

        let outcome = handle.try_claim("session_a", "Zoe").await.unwrap();
        assert_eq!(outcome, ClaimOutcome::NotWaiting);

        let view = handle.view().await.unwrap();
        assert_eq!(view.state, SessionState::Waiting);
    }

    #[tokio::test]
    async fn claim_emits_one_pairing_notification() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);
        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();

        let mut events = handle.subscribe().await.unwrap();
        handle.try_claim("session_b", "Bea").await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.source, MessageSource::System);
        assert!(event.content.contains("Bea"));
    }

    #[tokio::test]
    async fn release_claim_requires_matching_partner() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);
        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();
        handle.try_claim("session_b", "Bea").await.unwrap();

        assert!(!handle.release_claim("session_c").await.unwrap());
        assert!(handle.release_claim("session_b").await.unwrap());

        let view = handle.view().await.unwrap();
        assert_eq!(view.state, SessionState::Waiting);
        assert!(pool.contains("session_a"));
    }

    #[tokio::test]
    async fn reset_to_waiting_rejoins_pool() {
        let pool = Arc::new(UnpairedPool::new());
        let (handle, _shutdown) = spawn_actor("session_a", &pool);
        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();
        handle.try_claim("session_b", "Bea").await.unwrap();
        assert!(!pool.contains("session_a"));

        handle.reset_to_waiting().await.unwrap();
        assert!(pool.contains("session_a"));

        // Already waiting: no-op, still a member exactly once.
        handle.reset_to_waiting().await.unwrap();
        assert_eq!(pool.list(), vec!["session_a".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_purges_pool_entry() {
        let pool = Arc::new(UnpairedPool::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, task) = SessionActor::spawn("session_a".to_string(), pool.clone(), shutdown_rx);
        let handle = SessionHandle::new(tx, "session_a".to_string());

        handle
            .complete_introduction(test_introduction("Zoe"))
            .await
            .unwrap();
        assert!(pool.contains("session_a"));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert!(!pool.contains("session_a"));
    }

    #[tokio::test]
    async fn raw_command_round_trip() {
        let pool = Arc::new(UnpairedPool::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, _task) = SessionActor::spawn("session_a".to_string(), pool, shutdown_rx);

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(SessionCommand::RecordUserMessage {
            text: "Hello".to_string(),
            reply: reply_tx,
        })
        .await
        .unwrap();
        reply_rx.await.unwrap().unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(SessionCommand::GetConversation { reply: reply_tx })
            .await
            .unwrap();
        let conversation = reply_rx.await.unwrap();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].content, "Hello");

        shutdown_tx.send(true).unwrap();
    }
}
