//! Common test utilities.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use duet::api::ChatMessage;
use duet::chat::ChatService;
use duet::intro::{ExtractionOutcome, FollowUpResponder, Introduction, IntroductionExtractor};
use duet::llm::LlmError;
use duet::matchmaking::UnpairedPool;
use duet::server::{AppState, build_app};
use duet::session::SessionRegistry;

/// Extractor that replays a fixed script of outcomes, one per call.
pub struct ScriptedExtractor {
    outcomes: Mutex<VecDeque<Result<ExtractionOutcome, LlmError>>>,
}

impl ScriptedExtractor {
    pub fn new(outcomes: Vec<Result<ExtractionOutcome, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
        })
    }
}

#[async_trait]
impl IntroductionExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        _conversation: &[ChatMessage],
    ) -> Result<ExtractionOutcome, LlmError> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("extractor script exhausted")
    }
}

/// Responder that always asks the same question.
pub struct CannedResponder(pub &'static str);

#[async_trait]
impl FollowUpResponder for CannedResponder {
    async fn follow_up(
        &self,
        _conversation: &[ChatMessage],
        _missing: &[String],
    ) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

pub fn introduction(first_name: &str) -> Introduction {
    Introduction {
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        age: 30,
        interests: vec!["travel".to_string()],
    }
}

/// Extractor outcome that completes immediately with the given first name.
pub fn complete(first_name: &str) -> Result<ExtractionOutcome, LlmError> {
    Ok(ExtractionOutcome::Complete(introduction(first_name)))
}

pub fn incomplete(missing: &[&str]) -> Result<ExtractionOutcome, LlmError> {
    Ok(ExtractionOutcome::Incomplete {
        missing: missing.iter().map(|s| s.to_string()).collect(),
    })
}

/// Create a chat service backed by a scripted extractor.
pub fn test_service(script: Vec<Result<ExtractionOutcome, LlmError>>) -> Arc<ChatService> {
    let registry = Arc::new(SessionRegistry::new(Arc::new(UnpairedPool::new())));
    Arc::new(ChatService::new(
        registry,
        ScriptedExtractor::new(script),
        Arc::new(CannedResponder("What's your name?")),
    ))
}

/// Create a test app backed by a scripted extractor.
pub fn test_app_with_script(script: Vec<Result<ExtractionOutcome, LlmError>>) -> Router {
    let state = AppState {
        chat: test_service(script),
        keep_alive_interval_seconds: 15,
    };
    build_app(state, 30)
}

/// Create a test app whose extractor is never expected to run.
pub fn test_app() -> Router {
    test_app_with_script(Vec::new())
}
