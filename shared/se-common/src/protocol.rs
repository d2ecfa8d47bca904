//! Events API Protocol
//!
//! Header names, payload classification and the package-info string that
//! receivers advertise back to the platform.

use serde_json::Value;

use crate::error::{Error, Result};

/// Header carrying the request timestamp (integer seconds since epoch).
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the `v0=<hex>` request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Response header identifying the receiving software.
pub const POWERED_BY_HEADER: &str = "x-slack-powered-by";

/// Version tag prefixed to both the signature base string and the signature.
pub const SIGNATURE_VERSION: &str = "v0";

/// Body returned to any request to the endpoint without POSTing.
pub const DECOY_BODY: &str = "These are not the slackbots you're looking for.";

/// Classified inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// URL verification handshake; the challenge must be echoed back.
    Challenge(Value),
    /// Event callback carrying `event.type`.
    Event {
        /// Value of `event.type`, used as the dispatch key.
        event_type: String,
    },
    /// Neither `challenge` nor `event` is present.
    Unrecognized,
}

impl Envelope {
    /// Classify a parsed payload.
    ///
    /// `challenge` wins over `event` when both are present.
    pub fn classify(payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or(Error::NotAnObject)?;

        if let Some(challenge) = object.get("challenge") {
            return Ok(Self::Challenge(challenge.clone()));
        }

        match object.get("event") {
            Some(event) => event
                .get("type")
                .and_then(Value::as_str)
                .map(|event_type| Self::Event {
                    event_type: event_type.to_string(),
                })
                .ok_or(Error::MissingEventType),
            None => Ok(Self::Unrecognized),
        }
    }
}

/// Build the `<client>/<version> <platform>/<version> <os>/<arch>` string.
pub fn user_agent(client: &str, version: &str) -> String {
    format!(
        "{client}/{version} Rust/{} {}/{}",
        env!("CARGO_PKG_RUST_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}
