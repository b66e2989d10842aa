//! Randomized matchmaking over the unpaired pool.
//!
//! ```text
//! ┌─────────────┐   snapshot    ┌──────────────┐
//! │ Matchmaker  │──────────────▶│ UnpairedPool │
//! └──────┬──────┘               └──────────────┘
//!        │ try_claim / release_claim
//!        ▼
//! ┌──────────────┐
//! │ SessionActor │  (conditional transitions)
//! └──────────────┘
//! ```
//!
//! The pool snapshot is advisory; the actors' conditional claims are the
//! authority on who actually pairs with whom.

mod matchmaker;
mod pool;

pub use matchmaker::{MatchError, MatchOutcome, Matchmaker, MAX_DRAWS};
pub use pool::UnpairedPool;
