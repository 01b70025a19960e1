//! The webhook receiver.
//!
//! The upstream system treats any non-2xx answer as a delivery failure and
//! eventually disables the webhook, so deliveries are acknowledged before
//! any processing happens and decode failures are logged but still acked.
//! Processing runs on a spawned task per event.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;

use crate::app_state::AppState;
use crate::domain::WebhookEnvelope;

/// `POST /webhooks/board` — Receive one change event.
#[utoipa::path(
    post,
    path = "/webhooks/board",
    tag = "Webhooks",
    summary = "Receive a board change event",
    description = "Acknowledges the delivery immediately and processes the event asynchronously.",
    request_body = String,
    responses(
        (status = 200, description = "Delivery acknowledged"),
    )
)]
pub async fn receive_event(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<WebhookEnvelope>(&body) {
        Ok(envelope) => {
            let dispatcher = state.dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.process(envelope).await;
            });
        }
        Err(e) => {
            tracing::warn!(error = %e, "undecodable webhook payload; acknowledging anyway");
        }
    }
    StatusCode::OK
}

/// `HEAD /webhooks/board` — Upstream endpoint verification check.
#[utoipa::path(
    head,
    path = "/webhooks/board",
    tag = "Webhooks",
    summary = "Webhook endpoint verification",
    responses(
        (status = 200, description = "Endpoint reachable"),
    )
)]
pub async fn verify_endpoint() -> StatusCode {
    StatusCode::OK
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/board", post(receive_event).head(verify_endpoint))
}
