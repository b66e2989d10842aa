use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
pub struct ReadyzResponse {
    pub status: String,
    pub sessions: usize,
    pub unpaired: usize,
}

pub async fn readyz(State(state): State<AppState>) -> Json<ReadyzResponse> {
    let registry = state.chat.registry();
    Json(ReadyzResponse {
        status: "ok".to_string(),
        sessions: registry.len(),
        unpaired: registry.pool().len(),
    })
}
