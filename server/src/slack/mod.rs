//! Slack Events API Receiver
//!
//! Signed webhook gate (timestamp freshness + HMAC-SHA256 over the raw body)
//! in front of a timeout-bounded event dispatcher, with a parallel exception
//! routing path for handler failures.

pub mod dispatch;
pub mod error;
pub mod gate;
pub mod handler;
pub mod manager;

pub use dispatch::{DispatchSummary, EventDispatcher, DEFAULT_DISPATCH_TIMEOUT};
pub use error::{GateError, GateResult};
pub use handler::{without_payload, ErrorKind, ExceptionKey, HandlerError, HandlerResult};
pub use manager::{ManagerOptions, SlackEventManager, DEFAULT_TIMESTAMP_TOLERANCE};
