//! Session management.
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────────┐        ┌───────────────┐
//!  │ SessionRegistry │──owns──▶ SessionActor  │  (one per user, runs in a tokio task)
//!  │  (ID → Handle)  │        │  owns the FSM │
//!  └────────┬────────┘        │  + intro data │
//!           │                 │  + chat log   │
//!           │ clone           └───────▲───────┘
//!           ▼                         │ mpsc commands
//!  ┌─────────────────┐                │
//!  │  SessionHandle  │────────────────┘  (cheap cloneable sender)
//!  └─────────────────┘
//! ```
//!
//! - **SessionActor** — owns mutable session state (the
//!   introduction/waiting/chatting state machine, the introduction record,
//!   and the conversation log); processes commands sequentially via an mpsc
//!   channel so no locks are held across await points. Pool membership is
//!   synchronized inside the actor's single transition point.
//! - **SessionHandle** — cloneable reference that sends commands to an actor.
//!   All external code, including the matchmaker claiming a partner,
//!   interacts with sessions through handles.
//! - **SessionRegistry** — maps session IDs to handles; manages actor
//!   lifecycle and provides peer lookup.

mod actor;
mod actor_types;
mod handle;
mod registry;

pub use actor_types::{ActorError, ClaimOutcome, SessionView};
pub use handle::SessionHandle;
pub use registry::SessionRegistry;
