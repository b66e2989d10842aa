//! Duet - anonymous one-on-one chat with AI-guided introductions.

pub mod api;
pub mod chat;
pub mod config;
pub mod handlers;
pub mod intro;
pub mod llm;
pub mod matchmaking;
pub mod response;
pub mod server;
pub mod session;
