//! One-shot fetch of simulated time from an external time authority.
//!
//! The authority answers `GET <endpoint>` with
//! `{"currentSimTime": "<ISO 8601>"}`. Every failure mode maps to its own
//! [`SyncError`] variant so callers and logs can tell a slow authority from
//! a broken one.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

/// Errors that can occur while syncing with a time authority.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The authority did not answer within the sync timeout.
    #[error("sync with {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        /// The endpoint that was queried.
        endpoint: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The authority answered with a non-success HTTP status.
    #[error("sync with {endpoint} failed with HTTP status {status}")]
    HttpStatus {
        /// The endpoint that was queried.
        endpoint: String,
        /// The status code returned.
        status: u16,
    },

    /// No response was received (connection refused, DNS failure, reset).
    #[error("no response from time authority at {endpoint}: {reason}")]
    NoResponse {
        /// The endpoint that was queried.
        endpoint: String,
        /// Transport-level description of the failure.
        reason: String,
    },

    /// The response body did not carry a usable simulated time.
    #[error("invalid sync payload: {0}")]
    Validation(String),

    /// Any other request failure.
    #[error("sync request to {endpoint} failed: {reason}")]
    Request {
        /// The endpoint that was queried.
        endpoint: String,
        /// Description of the failure.
        reason: String,
    },
}

/// Wire shape of the time authority's response.
#[derive(Debug, Deserialize)]
struct SimTimePayload {
    #[serde(rename = "currentSimTime")]
    current_sim_time: Option<String>,
}

/// Query `endpoint` once and return the simulated time it reports.
///
/// The request carries `Content-Type: application/json`. The timeout is
/// taken from the `client`, and `timeout_ms` is only used in the error.
pub async fn fetch_sim_time(
    client: &reqwest::Client,
    endpoint: &str,
    timeout_ms: u64,
) -> Result<DateTime<Utc>, SyncError> {
    let response = client
        .get(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await
        .map_err(|e| classify(endpoint, timeout_ms, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::HttpStatus {
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify(endpoint, timeout_ms, &e))?;

    parse_payload(&body)
}

/// Decode a response body into a simulated time.
pub fn parse_payload(body: &str) -> Result<DateTime<Utc>, SyncError> {
    let payload: SimTimePayload = serde_json::from_str(body)
        .map_err(|e| SyncError::Validation(format!("response body is not valid JSON: {e}")))?;

    let raw = payload
        .current_sim_time
        .ok_or_else(|| SyncError::Validation("missing currentSimTime field".to_owned()))?;

    parse_sim_time(&raw)
}

/// Parse an ISO 8601 timestamp.
///
/// Accepts RFC 3339 with an offset. A timestamp without an offset is read
/// as UTC.
pub fn parse_sim_time(raw: &str) -> Result<DateTime<Utc>, SyncError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| SyncError::Validation(format!("unparsable currentSimTime {raw:?}: {e}")))
}

/// Map a transport error onto the sync error taxonomy.
fn classify(endpoint: &str, timeout_ms: u64, err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout {
            endpoint: endpoint.to_owned(),
            timeout_ms,
        }
    } else if let Some(status) = err.status() {
        SyncError::HttpStatus {
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
        }
    } else if err.is_connect() {
        SyncError::NoResponse {
            endpoint: endpoint.to_owned(),
            reason: err.to_string(),
        }
    } else {
        SyncError::Request {
            endpoint: endpoint.to_owned(),
            reason: err.to_string(),
        }
    }
}
