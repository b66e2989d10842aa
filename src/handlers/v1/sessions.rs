use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::{ChatMessage, MessageSource};
use crate::chat::{ChatError, InboundOutcome, WELCOME_MESSAGE};
use crate::matchmaking::MatchOutcome;
use crate::response;
use crate::server::AppState;
use crate::session::SessionView;

#[derive(Serialize)]
pub struct CreateSessionResponse {
    session_id: String,
    state: String,
    greeting: String,
    created_at: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    session_id: String,
    state: String,
    partner_id: Option<String>,
    message_count: usize,
    created_at: String,
    updated_at: String,
}

impl From<SessionView> for SessionResponse {
    fn from(view: SessionView) -> Self {
        Self {
            session_id: view.id,
            state: view.state.to_string(),
            partner_id: view.partner_id,
            message_count: view.message_count,
            created_at: view.created_at.to_rfc3339(),
            updated_at: view.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ListSessionsResponse {
    sessions: Vec<SessionResponse>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    content: String,
    /// Provenance of the message. Transports that loop deliveries back must
    /// tag them so the server can drop them instead of re-relaying.
    #[serde(default = "default_source")]
    source: MessageSource,
}

fn default_source() -> MessageSource {
    MessageSource::User
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    outcome: String,
    reply: Option<String>,
    partner_id: Option<String>,
}

#[derive(Serialize)]
pub struct GetMessagesResponse {
    messages: Vec<ChatMessage>,
}

/// POST /api/v1/sessions
pub async fn create_session(State(state): State<AppState>) -> Response {
    let handle = match state.chat.create_session().await {
        Ok(handle) => handle,
        Err(e) => return response::from_chat_error(&e).into_response(),
    };

    let view = match handle.view().await {
        Ok(view) => view,
        Err(e) => return response::internal_error(e.to_string()).into_response(),
    };

    let response = CreateSessionResponse {
        session_id: view.id,
        state: view.state.to_string(),
        greeting: WELCOME_MESSAGE.to_string(),
        created_at: view.created_at.to_rfc3339(),
    };

    (StatusCode::CREATED, Json(response)).into_response()
}

/// GET /api/v1/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Response {
    let sessions = state
        .chat
        .registry()
        .list()
        .await
        .into_iter()
        .map(SessionResponse::from)
        .collect();

    (StatusCode::OK, Json(ListSessionsResponse { sessions })).into_response()
}

/// GET /api/v1/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(handle) = state.chat.registry().get(&session_id) else {
        return response::not_found("Session not found").into_response();
    };

    match handle.view().await {
        Ok(view) => (StatusCode::OK, Json(SessionResponse::from(view))).into_response(),
        Err(_) => response::not_found("Session not found").into_response(),
    }
}

/// DELETE /api/v1/sessions/{session_id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.chat.end_session(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => response::from_chat_error(&e).into_response(),
    }
}

/// POST /api/v1/sessions/{session_id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let outcome = match state
        .chat
        .handle_inbound(&session_id, req.source, &req.content)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            if !matches!(e, ChatError::SessionNotFound(_) | ChatError::InvalidMessage(_)) {
                tracing::error!(session_id = %session_id, error = %e, "Failed to handle message");
            }
            return response::from_chat_error(&e).into_response();
        }
    };

    (StatusCode::OK, Json(describe_outcome(outcome))).into_response()
}

fn describe_outcome(outcome: InboundOutcome) -> SendMessageResponse {
    let partner_of = |m: &MatchOutcome| match m {
        MatchOutcome::Paired { partner_id } => Some(partner_id.clone()),
        MatchOutcome::NoCandidates => None,
    };

    match outcome {
        InboundOutcome::Ignored => SendMessageResponse {
            outcome: "ignored".to_string(),
            reply: None,
            partner_id: None,
        },
        InboundOutcome::FollowUp { text } => SendMessageResponse {
            outcome: "follow_up".to_string(),
            reply: Some(text),
            partner_id: None,
        },
        InboundOutcome::NoReply => SendMessageResponse {
            outcome: "no_reply".to_string(),
            reply: None,
            partner_id: None,
        },
        InboundOutcome::IntroductionComplete {
            notice,
            match_outcome,
        } => SendMessageResponse {
            outcome: "introduction_complete".to_string(),
            reply: Some(notice),
            partner_id: partner_of(&match_outcome),
        },
        InboundOutcome::Relayed => SendMessageResponse {
            outcome: "relayed".to_string(),
            reply: None,
            partner_id: None,
        },
        InboundOutcome::StillWaiting => SendMessageResponse {
            outcome: "waiting".to_string(),
            reply: None,
            partner_id: None,
        },
        InboundOutcome::PartnerLeft { match_outcome } => SendMessageResponse {
            outcome: "partner_left".to_string(),
            reply: None,
            partner_id: partner_of(&match_outcome),
        },
    }
}

/// GET /api/v1/sessions/{session_id}/messages
pub async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(handle) = state.chat.registry().get(&session_id) else {
        return response::not_found("Session not found").into_response();
    };

    match handle.conversation().await {
        Ok(messages) => (StatusCode::OK, Json(GetMessagesResponse { messages })).into_response(),
        Err(_) => response::not_found("Session not found").into_response(),
    }
}

/// GET /api/v1/sessions/{session_id}/events
///
/// SSE stream of messages pushed to this session: system notifications,
/// AI follow-ups, and relayed partner messages.
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(handle) = state.chat.registry().get(&session_id) else {
        return response::not_found("Session not found").into_response();
    };

    let rx = match handle.subscribe().await {
        Ok(rx) => rx,
        Err(_) => return response::not_found("Session not found").into_response(),
    };

    // Lagged receivers drop the overwritten events and pick back up.
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(event) => Event::default()
            .event("message")
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>),
        Err(_) => None,
    });

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.keep_alive_interval_seconds))
        .text("keep-alive");

    Sse::new(stream).keep_alive(keep_alive).into_response()
}
