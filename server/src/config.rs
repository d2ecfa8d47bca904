//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Slack app signing secret
    pub signing_secret: String,

    /// Mount path of the events endpoint (default: "/slack/events")
    pub events_path: String,

    /// Ceiling for one handler fan-out in milliseconds (default: 5000)
    pub dispatch_timeout_ms: u64,

    /// Allowed clock skew for request timestamps in seconds (default: 300)
    pub timestamp_tolerance_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            signing_secret: env::var("SLACK_SIGNING_SECRET")
                .context("SLACK_SIGNING_SECRET must be set")?,
            events_path: env::var("SLACK_EVENTS_PATH").unwrap_or_else(|_| "/slack/events".into()),
            dispatch_timeout_ms: env::var("SLACK_DISPATCH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            timestamp_tolerance_secs: env::var("SLACK_TIMESTAMP_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes
        })
    }

    /// Ceiling for one handler fan-out.
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Allowed clock skew for request timestamps.
    #[must_use]
    pub const fn timestamp_tolerance(&self) -> Duration {
        Duration::from_secs(self.timestamp_tolerance_secs)
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            signing_secret: "some".into(),
            events_path: "/slack/events".into(),
            dispatch_timeout_ms: 5000,
            timestamp_tolerance_secs: 300,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("signing_secret", &"[REDACTED]")
            .field("events_path", &self.events_path)
            .field("dispatch_timeout_ms", &self.dispatch_timeout_ms)
            .field("timestamp_tolerance_secs", &self.timestamp_tolerance_secs)
            .finish()
    }
}
