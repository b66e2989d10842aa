//! Random-draw pairing of waiting sessions.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::{ActorError, ClaimOutcome, SessionHandle, SessionRegistry};

/// Upper bound on candidate draws per attempt. Keeps an attempt cheap even
/// when the pool is large and full of stale entries.
pub const MAX_DRAWS: usize = 50;

/// Result of a matchmaking attempt, from the original caller's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The caller is now chatting with `partner_id`.
    Paired { partner_id: String },
    /// No viable candidate was found; the caller stays in the pool.
    NoCandidates,
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Outcome of a single pairing pass for one session.
enum PassOutcome {
    Paired(String),
    NoPartner,
    /// The session was claimed by a concurrent attempt mid-pass. `partner`
    /// is who it ended up with (when known); `takeover` is a candidate we
    /// had provisionally claimed and rolled back, which must not be left
    /// stranded.
    Superseded {
        partner: Option<String>,
        takeover: Option<String>,
    },
}

/// Pairs waiting sessions by bounded random draws from the pool snapshot.
///
/// The matchmaker never trusts the snapshot: every pairing goes through the
/// two sessions' conditional claims, so a session that left the pool between
/// snapshot and claim is simply skipped, and two concurrent attempts can
/// never produce overlapping pairs.
pub struct Matchmaker {
    registry: Arc<SessionRegistry>,
}

impl Matchmaker {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Attempt to find a partner for `caller_id`.
    ///
    /// Runs pairing passes until the attempt settles. When a pass rolls back
    /// a provisionally claimed candidate (because the caller was paired by a
    /// concurrent attempt first), the rolled-back session takes over as the
    /// next pass's caller so the rollback cannot strand it.
    pub async fn attempt(&self, caller_id: &str) -> Result<MatchOutcome, MatchError> {
        let mut current = caller_id.to_string();
        let mut caller_outcome: Option<MatchOutcome> = None;

        loop {
            let pass = self.pairing_pass(&current).await?;
            let for_caller = current == caller_id;

            match pass {
                PassOutcome::Paired(partner_id) => {
                    info!(
                        session_id = %current,
                        partner_id = %partner_id,
                        "Sessions paired"
                    );
                    return Ok(if for_caller {
                        MatchOutcome::Paired { partner_id }
                    } else {
                        caller_outcome.unwrap_or(MatchOutcome::NoCandidates)
                    });
                }
                PassOutcome::NoPartner => {
                    return Ok(if for_caller {
                        MatchOutcome::NoCandidates
                    } else {
                        caller_outcome.unwrap_or(MatchOutcome::NoCandidates)
                    });
                }
                PassOutcome::Superseded { partner, takeover } => {
                    if for_caller {
                        caller_outcome = Some(match partner {
                            Some(partner_id) => MatchOutcome::Paired { partner_id },
                            None => MatchOutcome::NoCandidates,
                        });
                    }
                    match takeover {
                        Some(next) => {
                            debug!(
                                session_id = %next,
                                "Continuing attempt for rolled-back session"
                            );
                            current = next;
                        }
                        None => return Ok(caller_outcome.unwrap_or(MatchOutcome::NoCandidates)),
                    }
                }
            }
        }
    }

    /// One pairing pass: snapshot the pool, draw candidates at random, and
    /// claim candidate-then-caller. The candidate side is claimed first so a
    /// failed caller claim can be rolled back without the pair ever being
    /// visible.
    async fn pairing_pass(&self, caller_id: &str) -> Result<PassOutcome, MatchError> {
        let caller = self
            .registry
            .get(caller_id)
            .ok_or_else(|| MatchError::SessionNotFound(caller_id.to_string()))?;
        let caller_first_name = first_name_of(&caller).await?;

        let mut candidates: Vec<String> = self
            .registry
            .pool()
            .list()
            .into_iter()
            .filter(|id| id != caller_id)
            .collect();

        let draws = candidates.len().min(MAX_DRAWS);
        for _ in 0..draws {
            if candidates.is_empty() {
                break;
            }
            // ThreadRng is not Send, so it must not be held across an await.
            let idx = rand::thread_rng().gen_range(0..candidates.len());
            let candidate_id = candidates.swap_remove(idx);

            let Some(candidate) = self.registry.get(&candidate_id) else {
                // Pool entry with no live actor behind it.
                self.registry.pool().remove(&candidate_id);
                continue;
            };
            let candidate_first_name = match first_name_of(&candidate).await {
                Ok(name) => name,
                Err(_) => continue,
            };

            let outcome = match candidate.try_claim(caller_id, &caller_first_name).await {
                Ok(outcome) => outcome,
                // Candidate actor stopped between snapshot and claim.
                Err(_) => continue,
            };

            match outcome {
                ClaimOutcome::Claimed => {
                    match caller.try_claim(&candidate_id, &candidate_first_name).await? {
                        ClaimOutcome::Claimed => return Ok(PassOutcome::Paired(candidate_id)),
                        // The symmetric attempt completed this very pair
                        // from the other side first.
                        ClaimOutcome::AlreadyChatting { partner }
                            if partner == candidate_id =>
                        {
                            return Ok(PassOutcome::Paired(candidate_id));
                        }
                        ClaimOutcome::AlreadyChatting { partner } => {
                            let takeover = self.roll_back(&candidate, caller_id).await;
                            return Ok(PassOutcome::Superseded {
                                partner: Some(partner),
                                takeover,
                            });
                        }
                        ClaimOutcome::NotWaiting => {
                            let takeover = self.roll_back(&candidate, caller_id).await;
                            return Ok(PassOutcome::Superseded {
                                partner: None,
                                takeover,
                            });
                        }
                    }
                }
                // Pair already formed by the candidate's own attempt.
                ClaimOutcome::AlreadyChatting { partner } if partner == caller_id => {
                    return Ok(PassOutcome::Paired(candidate_id));
                }
                // Stale pool entry; keep drawing.
                ClaimOutcome::AlreadyChatting { .. } | ClaimOutcome::NotWaiting => continue,
            }
        }

        debug!(session_id = %caller_id, "No viable partner in pool");
        Ok(PassOutcome::NoPartner)
    }

    /// Undo a provisional claim on `candidate`. Returns the candidate id if
    /// it was returned to waiting and needs a follow-up pass.
    async fn roll_back(&self, candidate: &SessionHandle, caller_id: &str) -> Option<String> {
        match candidate.release_claim(caller_id).await {
            Ok(true) => Some(candidate.id().to_string()),
            Ok(false) => None,
            Err(err) => {
                warn!(
                    session_id = %candidate.id(),
                    error = %err,
                    "Failed to roll back provisional claim"
                );
                None
            }
        }
    }
}

async fn first_name_of(handle: &SessionHandle) -> Result<String, ActorError> {
    let view = handle.view().await?;
    Ok(view
        .introduction
        .map(|i| i.first_name)
        .unwrap_or_default())
}
