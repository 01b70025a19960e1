//! System endpoints: health check and the control-plane backfill trigger.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, WardenError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

fn check_secret(state: &AppState, headers: &HeaderMap) -> Result<(), WardenError> {
    let expected = format!("Bearer {}", state.secret_key);
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented == expected {
        Ok(())
    } else {
        Err(WardenError::Unauthorized(
            "invalid control-plane credentials".to_string(),
        ))
    }
}

/// `POST /boards/:board_id/backfill` — Sweep a board's current state into
/// the backup store.
///
/// Triggered by the control plane when a board is first enabled. The sweep
/// runs asynchronously; failures are logged.
///
/// # Errors
///
/// Returns [`WardenError`] when credentials are invalid or the board has
/// no enabled registration.
#[utoipa::path(
    post,
    path = "/boards/{board_id}/backfill",
    tag = "System",
    summary = "Trigger an initial backup sweep",
    params(
        ("board_id" = String, Path, description = "Board id"),
    ),
    responses(
        (status = 202, description = "Sweep started"),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 404, description = "Board not registered or disabled", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn backfill_handler(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, WardenError> {
    check_secret(&state, &headers)?;

    // Resolve the registration up front so a bad board id fails the
    // request instead of a background task.
    let client = state.dispatcher.client_for(&board_id).await?;
    let applier = state.dispatcher.applier().clone();
    tokio::spawn(async move {
        if let Err(e) = applier.initial_backup(&client, &board_id).await {
            tracing::warn!(board = board_id, error = %e, "initial backup sweep failed");
        }
    });

    Ok(StatusCode::ACCEPTED)
}

/// System routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/boards/{board_id}/backfill", post(backfill_handler))
}
