//! Conversational storefront route.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::AppError;
use crate::models::ChatTurnMessage;
use crate::state::AppState;

/// Response body for a chat turn.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assembled assistant response. Never empty.
    pub result: String,
}

/// Run one conversation turn.
///
/// POST /api/chat
///
/// The body is the full ordered history as a bare JSON array of
/// `{ role, content }` messages; the server stores no conversation state.
/// The body is taken as a raw value so a malformed history is a 400, not a
/// deserialization rejection.
///
/// # Errors
///
/// Returns `AppError::Validation` for a malformed or empty history and
/// `AppError::Model` when the model transport fails.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ChatResponse>, AppError> {
    let history: Vec<ChatTurnMessage> = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("messages: {e}")))?;

    let result = state.chat().run_turn(&history).await?;
    Ok(Json(ChatResponse { result }))
}
