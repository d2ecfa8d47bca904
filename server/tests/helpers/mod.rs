//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for sending requests through the events router with
//! `tower::ServiceExt::oneshot`, plus builders that sign request bodies the
//! way the platform does.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use se_common::signing::sign_request;
use se_common::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use se_server::slack::SlackEventManager;

/// Signing secret shared by every test manager.
pub const SECRET: &str = "some";

/// Mount path used by the test managers.
pub const ENDPOINT: &str = "/slack/events";

/// A `reaction_added` event callback, serialized exactly as sent.
pub fn reaction_event_fixture() -> String {
    serde_json::json!({
        "token": "vFO9LARnLI7GflLR8tGqHgdy",
        "team_id": "T0JFD6M53",
        "api_app_id": "A28SCUES3",
        "event": {
            "type": "reaction_added",
            "user": "U27FFLNF4",
            "item": {
                "type": "message",
                "channel": "D2AQCJCQ2",
                "ts": "1477958101.000004"
            },
            "reaction": "grinning",
            "item_user": "U299ATJ2X",
            "event_ts": "1477958240.864741"
        },
        "type": "event_callback",
        "authed_users": ["U299ATJ2X"]
    })
    .to_string()
}

/// A URL verification handshake.
pub fn url_challenge_fixture() -> String {
    serde_json::json!({
        "token": "Jhj5dZrVaK7ZwHHjRyZWjbDl",
        "challenge": "valid_challenge_token",
        "type": "url_verification"
    })
    .to_string()
}

/// Current Unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Router wrapper for one-shot requests.
pub struct TestApp {
    pub router: Router,
}

impl TestApp {
    /// Build the events router for `manager`.
    pub fn new(manager: &SlackEventManager) -> Self {
        Self {
            router: manager.router(),
        }
    }

    /// Wrap an arbitrary router (e.g. a host app with the endpoint mounted).
    pub const fn from_router(router: Router) -> Self {
        Self { router }
    }

    /// Send a request through the router.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }
}

/// Build a request with optional timestamp and signature headers.
pub fn request(
    method: Method,
    path: &str,
    body: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(ts) = timestamp {
        builder = builder.header(TIMESTAMP_HEADER, ts);
    }
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// POST `body` to `path`, signed with [`SECRET`] at `timestamp`.
pub fn signed_post(path: &str, body: &str, timestamp: i64) -> Request<Body> {
    let ts = timestamp.to_string();
    let signature = sign_request(SECRET.as_bytes(), &ts, body.as_bytes());
    request(Method::POST, path, body, Some(&ts), Some(&signature))
}

/// Collect a response body into a string.
pub async fn body_to_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
