//! Slack Events Server
//!
//! Receives signed Events API callbacks, verifies them, and fans each event
//! out to the async handlers registered for it.

pub mod config;
pub mod slack;
