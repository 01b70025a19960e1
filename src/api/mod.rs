//! HTTP surface: webhook receiver, health check and the control-plane
//! backfill trigger.

pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete router.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::webhook::routes())
        .merge(handlers::system::routes())
}
