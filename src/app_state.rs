//! Shared application state injected into all Axum handlers.

use crate::service::Dispatcher;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event dispatcher driving both processing paths.
    pub dispatcher: Dispatcher,
    /// Shared secret authenticating control-plane requests.
    pub secret_key: String,
}
