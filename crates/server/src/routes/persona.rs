//! Company persona settings routes.
//!
//! A single-record resource: the persona the chat assistant speaks with.
//! Create and update are separate verbs with separate failure modes.

use axum::{Json, extract::State, http::StatusCode};

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::models::{PersonaInput, PersonaSettings};
use crate::state::AppState;

/// Fetch the stored persona settings.
///
/// GET /api/company/settings
///
/// # Errors
///
/// Returns `AppError::NotFound` when no settings record exists yet. The
/// chat surface falls back to a default persona in that case; admin clients
/// see the 404 and offer creation.
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<PersonaSettings>, AppError> {
    let settings = state
        .settings()
        .get()
        .await?
        .ok_or_else(|| AppError::NotFound("company settings".to_string()))?;
    Ok(Json(settings))
}

/// Create the persona settings record.
///
/// POST /api/company/settings
///
/// # Errors
///
/// Returns `AppError::Validation` for empty fields and `AppError::Conflict`
/// when a record already exists.
pub async fn create_settings(
    State(state): State<AppState>,
    Json(body): Json<PersonaInput>,
) -> Result<(StatusCode, Json<PersonaSettings>), AppError> {
    validate(&body)?;
    let settings = state.settings().create(&body).await?;
    Ok((StatusCode::CREATED, Json(settings)))
}

/// Replace the persona settings record.
///
/// PUT /api/company/settings
///
/// # Errors
///
/// Returns `AppError::Validation` for empty fields and `AppError::NotFound`
/// when no record exists to update.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<PersonaInput>,
) -> Result<Json<PersonaSettings>, AppError> {
    validate(&body)?;
    let settings = state.settings().update(&body).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound("company settings".to_string()),
        other => other.into(),
    })?;
    Ok(Json(settings))
}

fn validate(input: &PersonaInput) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|field| AppError::Validation(format!("{field} must not be empty")))
}
