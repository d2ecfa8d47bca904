//! Request Gate
//!
//! The single entry point for inbound Events API requests: timestamp
//! freshness, signature verification over the raw body, then either the
//! URL-verification echo or a dispatch of the event.

use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use se_common::signing::verify_request;
use se_common::{Envelope, DECOY_BODY, POWERED_BY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use super::error::{GateError, GateResult};
use super::manager::SlackEventManager;

/// Handle one request to the events endpoint.
#[tracing::instrument(skip_all, fields(method = %method))]
pub async fn receive_event(
    State(manager): State<SlackEventManager>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> GateResult<Response> {
    if method != Method::POST {
        return Ok((StatusCode::NOT_FOUND, DECOY_BODY).into_response());
    }

    let timestamp = check_timestamp(
        &headers,
        Utc::now().timestamp_millis(),
        manager.timestamp_tolerance(),
    )?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or(GateError::MissingSignature)?
        .to_str()
        .map_err(|_| GateError::InvalidSignature)?;
    if !verify_request(manager.signing_secret(), timestamp, &body, signature) {
        return Err(GateError::InvalidSignature);
    }

    let payload: Value = serde_json::from_slice(&body)?;
    match Envelope::classify(&payload)? {
        Envelope::Challenge(challenge) => {
            debug!("Answering URL verification challenge");
            Ok((StatusCode::OK, Json(challenge)).into_response())
        }
        Envelope::Event { event_type } => {
            let summary = manager.dispatch(&event_type, payload).await;
            debug!(
                event_type = %event_type,
                handlers = summary.handlers,
                finished = summary.finished,
                timed_out = summary.timed_out,
                "Event accepted"
            );
            Ok((
                StatusCode::OK,
                [(POWERED_BY_HEADER, manager.package_info().to_string())],
            )
                .into_response())
        }
        Envelope::Unrecognized => Err(GateError::UnrecognizedPayload),
    }
}

/// Validate the timestamp header against `now_ms` and return it verbatim.
///
/// The header carries whole seconds; the receipt time keeps its millisecond
/// fraction so the tolerance window is exact. The raw header text is what the
/// platform signed, so it is returned as-is for the signature base string.
fn check_timestamp(headers: &HeaderMap, now_ms: i64, tolerance: Duration) -> GateResult<&str> {
    let raw = headers
        .get(TIMESTAMP_HEADER)
        .ok_or(GateError::MissingTimestamp)?
        .to_str()
        .map_err(|_| GateError::InvalidTimestamp)?;
    let timestamp: i64 = raw.parse().map_err(|_| GateError::InvalidTimestamp)?;

    let skew_ms = now_ms.abs_diff(timestamp.saturating_mul(1000));
    if u128::from(skew_ms) > tolerance.as_millis() {
        return Err(GateError::StaleTimestamp { timestamp, now_ms });
    }

    Ok(raw)
}
