//! Message handling for the chat lifecycle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{MessageSource, SessionState};
use crate::intro::{
    ExtractionOutcome, FollowUpResponder, IntroductionExtractor, all_fields_missing,
};
use crate::matchmaking::{MatchOutcome, Matchmaker};
use crate::session::{SessionHandle, SessionRegistry};

use super::ChatError;

/// Opening message delivered to every new session.
pub const WELCOME_MESSAGE: &str = "Welcome! Before we find you a chat partner, tell me a bit \
     about yourself: your name, your age, and what you're into.";

const WAITING_NOTICE: &str = "Still looking for a partner. Hang tight!";

/// What a handled inbound message resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Non-user message, dropped by the echo guard.
    Ignored,
    /// Introduction still incomplete; a follow-up question was sent.
    FollowUp { text: String },
    /// Introduction still incomplete and the responder failed; nothing was
    /// said this turn.
    NoReply,
    /// Introduction complete; the session entered the pool and matchmaking
    /// ran once.
    IntroductionComplete {
        notice: String,
        match_outcome: MatchOutcome,
    },
    /// Message relayed to the chat partner.
    Relayed,
    /// Session is waiting; the message was acknowledged but not relayed.
    StillWaiting,
    /// The partner vanished mid-chat; the session is waiting again.
    PartnerLeft { match_outcome: MatchOutcome },
}

/// Orchestrates the session lifecycle: the guided introduction, the hand-off
/// to matchmaking, and partner-to-partner relay.
///
/// Matchmaking runs here rather than inside an actor so that no actor ever
/// awaits another actor's mailbox while handling a command.
pub struct ChatService {
    registry: Arc<SessionRegistry>,
    matchmaker: Matchmaker,
    extractor: Arc<dyn IntroductionExtractor>,
    responder: Arc<dyn FollowUpResponder>,
}

impl ChatService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        extractor: Arc<dyn IntroductionExtractor>,
        responder: Arc<dyn FollowUpResponder>,
    ) -> Self {
        let matchmaker = Matchmaker::new(registry.clone());
        Self {
            registry,
            matchmaker,
            extractor,
            responder,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Create a session and deliver the welcome prompt.
    pub async fn create_session(&self) -> Result<SessionHandle, ChatError> {
        let handle = self.registry.create();
        handle.deliver_system(WELCOME_MESSAGE.to_string()).await?;
        Ok(handle)
    }

    /// Handle one inbound message for a session.
    ///
    /// Only user-authored messages drive the state machine. System- and
    /// partner-tagged messages are dropped here: deliveries that loop back
    /// through the transport must never be mistaken for user input, and
    /// partner provenance is assigned by the relay, never by callers.
    pub async fn handle_inbound(
        &self,
        session_id: &str,
        source: MessageSource,
        text: &str,
    ) -> Result<InboundOutcome, ChatError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        match source {
            MessageSource::System | MessageSource::Partner => {
                debug!(
                    session_id = %session_id,
                    source = ?source,
                    "Dropping non-user inbound message"
                );
                return Ok(InboundOutcome::Ignored);
            }
            MessageSource::User => {}
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidMessage(
                "message must not be empty".to_string(),
            ));
        }

        handle.record_user_message(text.to_string()).await?;

        let view = handle.view().await?;
        match view.state {
            SessionState::Introduction => self.advance_introduction(&handle).await,
            SessionState::Waiting => {
                handle.deliver_system(WAITING_NOTICE.to_string()).await?;
                Ok(InboundOutcome::StillWaiting)
            }
            SessionState::Chatting => {
                // Chatting always carries a partner id.
                let partner_id = view.partner_id.ok_or_else(|| {
                    ChatError::Actor(crate::session::ActorError::InvalidTransition(
                        "chatting session has no partner".to_string(),
                    ))
                })?;
                self.relay(&handle, &partner_id, text).await
            }
        }
    }

    /// Run extraction over the conversation so far; either complete the
    /// introduction and kick off matchmaking, or ask a follow-up question.
    ///
    /// Collaborator failures are never fatal to the session: a failed
    /// extraction counts as nothing extracted, and a failed follow-up means
    /// no reply this turn.
    async fn advance_introduction(
        &self,
        handle: &SessionHandle,
    ) -> Result<InboundOutcome, ChatError> {
        let conversation = handle.conversation().await?;

        let extraction = match self.extractor.extract(&conversation).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    session_id = %handle.id(),
                    error = %err,
                    "Extractor failed, treating as nothing extracted"
                );
                ExtractionOutcome::Incomplete {
                    missing: all_fields_missing(),
                }
            }
        };

        match extraction {
            ExtractionOutcome::Complete(introduction) => {
                info!(
                    session_id = %handle.id(),
                    first_name = %introduction.first_name,
                    "Introduction complete"
                );
                let notice = handle.complete_introduction(introduction).await?;
                let match_outcome = self.matchmaker.attempt(handle.id()).await?;
                Ok(InboundOutcome::IntroductionComplete {
                    notice,
                    match_outcome,
                })
            }
            ExtractionOutcome::Incomplete { missing } => {
                debug!(
                    session_id = %handle.id(),
                    missing = ?missing,
                    "Introduction incomplete, asking follow-up"
                );
                match self.responder.follow_up(&conversation, &missing).await {
                    Ok(question) => {
                        handle.deliver_system(question.clone()).await?;
                        Ok(InboundOutcome::FollowUp { text: question })
                    }
                    Err(err) => {
                        warn!(
                            session_id = %handle.id(),
                            error = %err,
                            "Follow-up responder failed, no reply this turn"
                        );
                        Ok(InboundOutcome::NoReply)
                    }
                }
            }
        }
    }

    /// Relay a user message to the chat partner. If the partner is gone, the
    /// sender is returned to the pool and matchmaking runs again.
    async fn relay(
        &self,
        handle: &SessionHandle,
        partner_id: &str,
        text: &str,
    ) -> Result<InboundOutcome, ChatError> {
        let delivered = match self.registry.get(partner_id) {
            Some(partner) => partner.deliver_partner(text.to_string()).await.is_ok(),
            None => false,
        };

        if delivered {
            return Ok(InboundOutcome::Relayed);
        }

        info!(
            session_id = %handle.id(),
            partner_id = %partner_id,
            "Partner vanished, returning session to pool"
        );
        self.registry.pool().remove(partner_id);
        handle.reset_to_waiting().await?;
        let match_outcome = self.matchmaker.attempt(handle.id()).await?;
        Ok(InboundOutcome::PartnerLeft { match_outcome })
    }

    /// Tear down a session. If it was mid-chat, the partner is notified and
    /// rejoins the pool.
    pub async fn end_session(&self, session_id: &str) -> Result<(), ChatError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let partner_id = handle.view().await?.partner_id;
        self.registry.remove(session_id);
        drop(handle);

        if let Some(partner_id) = partner_id {
            if let Some(partner) = self.registry.get(&partner_id) {
                // Partner may already have transitioned; a failed reset is
                // not this caller's problem.
                if partner.reset_to_waiting().await.is_ok() {
                    let _ = self.matchmaker.attempt(&partner_id).await;
                }
            }
        }
        Ok(())
    }
}
