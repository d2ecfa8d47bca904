//! Handler Wrapping & Exception Routing
//!
//! Business handlers never fail outward. A failed (or panicking) handler is
//! routed to the exception handlers registered for the error's kind and for
//! the originating event name, each of which is its own fan-out. Failures
//! inside exception handlers are terminal and only logged.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::dispatch::{EventDispatcher, Handler};

/// Result type returned by every registered handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Failure raised by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload did not have the shape the handler expected.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON (de)serialization failed inside the handler.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A call to another system failed.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Tag used to register exception handlers against a class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// [`HandlerError::InvalidPayload`]
    InvalidPayload,
    /// [`HandlerError::Json`]
    Json,
    /// [`HandlerError::Upstream`]
    Upstream,
    /// [`HandlerError::Panicked`]
    Panicked,
    /// [`HandlerError::Other`]
    Other,
}

impl HandlerError {
    /// The kind tag exception handlers can register against.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPayload(_) => ErrorKind::InvalidPayload,
            Self::Json(_) => ErrorKind::Json,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Panicked(_) => ErrorKind::Panicked,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Where an exception handler is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExceptionKey {
    /// Every failure of this kind, whatever the event.
    Kind(ErrorKind),
    /// Every failure raised while handling this event name.
    Event(String),
}

impl From<ErrorKind> for ExceptionKey {
    fn from(kind: ErrorKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<&str> for ExceptionKey {
    fn from(event: &str) -> Self {
        Self::Event(event.to_string())
    }
}

impl From<String> for ExceptionKey {
    fn from(event: String) -> Self {
        Self::Event(event)
    }
}

/// Adapt a handler that does not need the payload to the fixed signature.
pub fn without_payload<P, F, Fut>(handler: F) -> impl Fn(Arc<P>) -> Fut + Send + Sync + 'static
where
    P: 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    move |_payload: Arc<P>| handler()
}

/// The exception registry: one table keyed by error kind, one by event name.
pub struct ExceptionRouter {
    by_kind: EventDispatcher<ErrorKind, HandlerError>,
    by_event: EventDispatcher<String, HandlerError>,
}

impl ExceptionRouter {
    /// Create empty kind and event tables sharing one fan-out ceiling.
    pub fn new(timeout: Duration) -> Self {
        Self {
            by_kind: EventDispatcher::with_timeout(timeout),
            by_event: EventDispatcher::with_timeout(timeout),
        }
    }

    /// Register an exception handler. Its own failures are discarded.
    pub fn add<F, Fut>(&self, key: ExceptionKey, handler: F)
    where
        F: Fn(Arc<HandlerError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let wrapped = terminal(handler);
        match key {
            ExceptionKey::Kind(kind) => self.by_kind.add(kind, wrapped),
            ExceptionKey::Event(event) => self.by_event.add(event, wrapped),
        }
    }

    /// Whether any exception handler is registered under `key`.
    pub fn contains(&self, key: &ExceptionKey) -> bool {
        match key {
            ExceptionKey::Kind(kind) => self.by_kind.contains(kind),
            ExceptionKey::Event(event) => self.by_event.contains(event.as_str()),
        }
    }

    /// Fan a failure out to the kind table, then the event table.
    ///
    /// Returns how many tables matched (0, 1 or 2).
    pub async fn route(&self, event_name: &str, error: HandlerError) -> usize {
        let kind = error.kind();
        let error = Arc::new(error);
        let mut routed = 0;

        if self.by_kind.contains(&kind) {
            self.by_kind.dispatch(&kind, Arc::clone(&error)).await;
            routed += 1;
        }
        if self.by_event.contains(event_name) {
            self.by_event.dispatch(event_name, Arc::clone(&error)).await;
            routed += 1;
        }

        if routed == 0 {
            warn!(
                event = event_name,
                kind = ?kind,
                error = %error,
                "Event handler failed with no exception handler registered"
            );
        } else {
            debug!(event = event_name, kind = ?kind, routed, "Routed handler failure");
        }

        routed
    }
}

/// Wrap a business handler so its failures go to `exceptions`.
pub(crate) fn guarded<F, Fut>(
    event_name: String,
    exceptions: Arc<ExceptionRouter>,
    handler: F,
) -> Handler<Value>
where
    F: Fn(Arc<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let handler = Arc::new(handler);
    let event_name: Arc<str> = event_name.into();
    Arc::new(move |payload: Arc<Value>| {
        let handler = Arc::clone(&handler);
        let exceptions = Arc::clone(&exceptions);
        let event_name = Arc::clone(&event_name);
        async move {
            if let Err(error) = run_caught(async move { handler(payload).await }).await {
                exceptions.route(&event_name, error).await;
            }
        }
        .boxed()
    })
}

/// Wrap an exception handler; anything it raises stops here.
fn terminal<F, Fut>(handler: F) -> Handler<HandlerError>
where
    F: Fn(Arc<HandlerError>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |error: Arc<HandlerError>| {
        let handler = Arc::clone(&handler);
        async move {
            if let Err(e) = run_caught(async move { handler(error).await }).await {
                debug!(error = %e, "Exception handler failed, discarding");
            }
        }
        .boxed()
    })
}

/// Await a handler future, turning a panic into `HandlerError::Panicked`.
async fn run_caught<Fut>(fut: Fut) -> HandlerResult
where
    Fut: Future<Output = HandlerResult>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::Panicked(panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
