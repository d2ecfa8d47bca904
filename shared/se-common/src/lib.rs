//! Slack Events Common Library
//!
//! Protocol vocabulary and request signing shared by the webhook receiver
//! and anything that needs to produce signed test traffic.

pub mod error;
pub mod protocol;
pub mod signing;

pub use error::{Error, Result};
pub use protocol::*;
