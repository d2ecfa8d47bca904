//! Slack Event Manager
//!
//! Owns the signing secret and both handler registries, exposes the
//! registration API and builds the axum routes for the events endpoint.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::any, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::dispatch::{DispatchSummary, EventDispatcher, DEFAULT_DISPATCH_TIMEOUT};
use super::gate::receive_event;
use super::handler::{guarded, ExceptionKey, ExceptionRouter, HandlerError, HandlerResult};
use crate::config::Config;

/// Default allowed clock skew between the platform and this receiver.
pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(300); // 5 minutes

/// Tunables for a manager.
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    /// Ceiling for each handler fan-out.
    pub dispatch_timeout: Duration,
    /// Allowed skew for request timestamps.
    pub timestamp_tolerance: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            timestamp_tolerance: DEFAULT_TIMESTAMP_TOLERANCE,
        }
    }
}

/// Events API receiver.
///
/// Cheap to clone; clones share the same registries. Handlers may be
/// registered before or after the router is built.
#[derive(Clone)]
pub struct SlackEventManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    signing_secret: Vec<u8>,
    endpoint: String,
    package_info: String,
    timestamp_tolerance: Duration,
    events: EventDispatcher<String, Value>,
    exceptions: Arc<ExceptionRouter>,
}

impl SlackEventManager {
    /// Create a manager for `endpoint` with default options.
    pub fn new(signing_secret: impl AsRef<[u8]>, endpoint: impl Into<String>) -> Self {
        Self::with_options(signing_secret, endpoint, ManagerOptions::default())
    }

    /// Create a manager with explicit options.
    pub fn with_options(
        signing_secret: impl AsRef<[u8]>,
        endpoint: impl Into<String>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                signing_secret: signing_secret.as_ref().to_vec(),
                endpoint: normalize_endpoint(&endpoint.into()),
                package_info: se_common::user_agent(
                    env!("CARGO_PKG_NAME"),
                    env!("CARGO_PKG_VERSION"),
                ),
                timestamp_tolerance: options.timestamp_tolerance,
                events: EventDispatcher::with_timeout(options.dispatch_timeout),
                exceptions: Arc::new(ExceptionRouter::new(options.dispatch_timeout)),
            }),
        }
    }

    /// Create a manager from server configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(
            &config.signing_secret,
            config.events_path.clone(),
            ManagerOptions {
                dispatch_timeout: config.dispatch_timeout(),
                timestamp_tolerance: config.timestamp_tolerance(),
            },
        )
    }

    /// Normalized mount path (leading slash, no trailing slash).
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Value sent in the powered-by response header.
    pub fn package_info(&self) -> &str {
        &self.inner.package_info
    }

    pub(crate) fn signing_secret(&self) -> &[u8] {
        &self.inner.signing_secret
    }

    pub(crate) fn timestamp_tolerance(&self) -> Duration {
        self.inner.timestamp_tolerance
    }

    /// Register `handler` for `event_name`.
    ///
    /// Failures are routed to exception handlers and never reach the caller.
    pub fn on_event<F, Fut>(&self, event_name: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(Arc<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let event_name = event_name.into();
        let wrapped = guarded(
            event_name.clone(),
            Arc::clone(&self.inner.exceptions),
            handler,
        );
        self.inner.events.add(event_name, wrapped);
        self
    }

    /// Builder form of [`Self::on_event`].
    pub fn on(&self, event_name: impl Into<String>) -> EventRegistration<'_> {
        EventRegistration {
            manager: self,
            event_name: event_name.into(),
        }
    }

    /// Register an exception handler under an error kind or an event name.
    pub fn add_exception<F, Fut>(&self, key: impl Into<ExceptionKey>, handler: F) -> &Self
    where
        F: Fn(Arc<HandlerError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.inner.exceptions.add(key.into(), handler);
        self
    }

    /// Builder form of [`Self::add_exception`].
    pub fn on_exception(&self, key: impl Into<ExceptionKey>) -> ExceptionRegistration<'_> {
        ExceptionRegistration {
            manager: self,
            key: key.into(),
        }
    }

    /// Event names with at least one handler.
    pub fn registered_events(&self) -> Vec<String> {
        self.inner.events.event_names()
    }

    /// Whether any exception handler is registered under `key`.
    pub fn has_exception_handler(&self, key: &ExceptionKey) -> bool {
        self.inner.exceptions.contains(key)
    }

    /// Fan `payload` out to every handler registered for `event_name`.
    pub async fn dispatch(&self, event_name: &str, payload: Value) -> DispatchSummary {
        self.inner
            .events
            .dispatch(event_name, Arc::new(payload))
            .await
    }

    /// Routes for the events endpoint, with and without a trailing slash.
    pub fn router(&self) -> Router {
        let base = self.endpoint().to_string();
        let mut router = Router::new().route(&base, any(receive_event));
        if base != "/" {
            router = router.route(&format!("{base}/"), any(receive_event));
        }

        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// Merge the events endpoint into an existing application.
    pub fn mount(&self, app: Router) -> Router {
        info!(endpoint = %self.endpoint(), "Mounting Slack events endpoint");
        app.merge(self.router())
    }
}

impl std::fmt::Debug for SlackEventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackEventManager")
            .field("signing_secret", &"[REDACTED]")
            .field("endpoint", &self.inner.endpoint)
            .field("events", &self.inner.events.event_names())
            .finish()
    }
}

/// Pending registration returned by [`SlackEventManager::on`].
#[must_use = "call `handle` to register the handler"]
pub struct EventRegistration<'a> {
    manager: &'a SlackEventManager,
    event_name: String,
}

impl<'a> EventRegistration<'a> {
    /// Register `handler` for the pending event name.
    pub fn handle<F, Fut>(self, handler: F) -> &'a SlackEventManager
    where
        F: Fn(Arc<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.manager.on_event(self.event_name, handler)
    }
}

/// Pending registration returned by [`SlackEventManager::on_exception`].
#[must_use = "call `handle` to register the handler"]
pub struct ExceptionRegistration<'a> {
    manager: &'a SlackEventManager,
    key: ExceptionKey,
}

impl<'a> ExceptionRegistration<'a> {
    /// Register `handler` under the pending key.
    pub fn handle<F, Fut>(self, handler: F) -> &'a SlackEventManager
    where
        F: Fn(Arc<HandlerError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.manager.add_exception(self.key, handler)
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::handler::ErrorKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn endpoint_normalization() {
        assert_eq!(normalize_endpoint("/slack/events/"), "/slack/events");
        assert_eq!(normalize_endpoint("slack/events"), "/slack/events");
        assert_eq!(normalize_endpoint("/"), "/");
        assert_eq!(normalize_endpoint(""), "/");
    }

    #[test]
    fn managers_have_independent_registries() {
        let first = SlackEventManager::new("secret", "/a");
        let second = SlackEventManager::new("secret", "/b");

        first.on_event("reaction_added", |_payload| async { Ok(()) });
        first.add_exception(ErrorKind::Json, |_error| async { Ok(()) });

        assert_eq!(first.registered_events(), vec!["reaction_added".to_string()]);
        assert!(second.registered_events().is_empty());
        assert!(first.has_exception_handler(&ErrorKind::Json.into()));
        assert!(!second.has_exception_handler(&ErrorKind::Json.into()));
    }

    #[tokio::test]
    async fn builder_forms_register() {
        let manager = SlackEventManager::new("secret", "/slack/events");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        manager.on("app_mention").handle(move |payload: Arc<Value>| {
            let counter = Arc::clone(&counter);
            async move {
                assert_eq!(payload["event"]["type"], "app_mention");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        manager
            .on_exception("app_mention")
            .handle(|_error| async { Ok(()) });

        let summary = manager
            .dispatch("app_mention", json!({ "event": { "type": "app_mention" } }))
            .await;

        assert_eq!(summary.handlers, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(manager.has_exception_handler(&"app_mention".into()));
    }

    #[test]
    fn debug_redacts_secret() {
        let manager = SlackEventManager::new("hunter2", "/slack/events");
        let rendered = format!("{manager:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }
}
