//! Shared request plumbing for the service clients.

use std::time::Duration;

use reqwest::RequestBuilder;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// Default per-request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Connection settings for one external service.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL, without a trailing slash (e.g. `http://bank:3000`).
    pub base_url: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl HttpClientConfig {
    /// Create a config with the default timeout.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join a path onto the base URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Build a `reqwest` client honouring the timeout.
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, ClientError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))
    }
}

/// Send a request and decode its JSON response.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    service: &'static str,
) -> Result<T, ClientError> {
    let body = send(request, service).await?;
    decode(&body, service)
}

/// Send a request and return the raw body of a successful response.
pub(crate) async fn send(
    request: RequestBuilder,
    service: &'static str,
) -> Result<String, ClientError> {
    let response = request
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| transport_error(&e, service))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(ClientError::HttpStatus {
            service,
            status: status.as_u16(),
            body,
        });
    }

    response.text().await.map_err(|e| transport_error(&e, service))
}

/// Decode a JSON body.
pub(crate) fn decode<T: DeserializeOwned>(
    body: &str,
    service: &'static str,
) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode {
        service,
        reason: e.to_string(),
    })
}

fn transport_error(err: &reqwest::Error, service: &'static str) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout { service }
    } else {
        ClientError::Request {
            service,
            reason: err.to_string(),
        }
    }
}
