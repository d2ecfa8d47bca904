//! Payload Classification Errors

use thiserror::Error;

/// Errors raised while classifying an inbound payload.
#[derive(Debug, Error)]
pub enum Error {
    /// The body was valid JSON but not a JSON object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// An `event` field was present without a string `event.type`.
    #[error("event payload is missing `event.type`")]
    MissingEventType,
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
