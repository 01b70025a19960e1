//! Service error types with HTTP status code mapping.
//!
//! [`WardenError`] is the central error type. Most errors never reach an HTTP
//! response: webhook processing happens after the ack, so failures are logged
//! and the event is abandoned. The [`IntoResponse`] mapping covers the small
//! synchronous surface (the control-plane backfill endpoint).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "board not registered: 4f2b...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                |
/// |-----------|--------------------|----------------------------|
/// | 1000–1999 | Validation/Auth    | 400 / 401                  |
/// | 2000–2999 | Registration state | 404 Not Found              |
/// | 3000–3999 | Infrastructure     | 500 Internal Server Error  |
/// | 4000–4999 | External API       | 502 Bad Gateway            |
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Caller is not authorized for this endpoint.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No registration row exists for the board.
    #[error("board not registered: {0}")]
    BoardNotRegistered(String),

    /// The board is registered but enforcement is switched off.
    #[error("board disabled: {0}")]
    BoardDisabled(String),

    /// Backup store (PostgreSQL) failure.
    #[error("store error: {0}")]
    Store(String),

    /// Admin cache / replication guard failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Object storage failure.
    #[error("object storage error: {0}")]
    ObjectStorage(String),

    /// The external API answered with a non-success status.
    #[error("external api returned {status}: {body}")]
    Api {
        /// HTTP status returned by the external API.
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },

    /// Transport-level failure talking to the external API.
    #[error("external api transport error: {0}")]
    Transport(String),
}

impl WardenError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthorized(_) => 1002,
            Self::BoardNotRegistered(_) => 2001,
            Self::BoardDisabled(_) => 2002,
            Self::Store(_) => 3001,
            Self::Cache(_) => 3002,
            Self::ObjectStorage(_) => 3003,
            Self::Api { .. } => 4001,
            Self::Transport(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BoardNotRegistered(_) | Self::BoardDisabled(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Cache(_) | Self::ObjectStorage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Api { .. } | Self::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// True when the external API rejected the call for lack of access
    /// (token revoked, board not visible). These trigger an alternate
    /// compensation strategy instead of aborting.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::Api {
                status: 401 | 403,
                ..
            }
        )
    }
}

impl IntoResponse for WardenError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
