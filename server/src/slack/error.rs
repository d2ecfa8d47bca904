//! Request Gate Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Reasons the gate refuses a request.
#[derive(Debug, Error)]
pub enum GateError {
    /// Timestamp header absent.
    #[error("Missing request timestamp")]
    MissingTimestamp,

    /// Timestamp header is not an integer.
    #[error("Invalid request timestamp")]
    InvalidTimestamp,

    /// Timestamp outside the allowed skew.
    #[error("Stale request timestamp {timestamp} (now {now_ms} ms)")]
    StaleTimestamp {
        /// Timestamp the request carried.
        timestamp: i64,
        /// Receipt time in milliseconds.
        now_ms: i64,
    },

    /// Signature header absent.
    #[error("Missing request signature")]
    MissingSignature,

    /// Signature does not match the body.
    #[error("Invalid request signature")]
    InvalidSignature,

    /// Body is not JSON.
    #[error("Malformed body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// Body is JSON but not a usable payload.
    #[error("Invalid payload: {0}")]
    Payload(#[from] se_common::Error),

    /// Neither `challenge` nor `event` present.
    #[error("Payload carries neither `challenge` nor `event`")]
    UnrecognizedPayload,
}

impl GateError {
    /// Whether this failure is an authentication failure (403).
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingTimestamp
                | Self::InvalidTimestamp
                | Self::StaleTimestamp { .. }
                | Self::MissingSignature
                | Self::InvalidSignature
        )
    }
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        if self.is_authentication_failure() {
            warn!(reason = %self, "Rejected unauthenticated webhook request");
            // Nothing about the failure is echoed to the caller.
            return StatusCode::FORBIDDEN.into_response();
        }

        let code = match &self {
            Self::MalformedBody(_) => "MALFORMED_BODY",
            Self::Payload(_) => "INVALID_PAYLOAD",
            _ => "UNRECOGNIZED_PAYLOAD",
        };
        warn!(reason = %self, "Rejected webhook payload");

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
