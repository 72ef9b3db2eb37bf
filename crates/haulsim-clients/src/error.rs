//! Error types for the external service clients.

/// Errors that can occur when calling the bank or the market.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The service did not answer within the request timeout.
    #[error("{service} request timed out")]
    Timeout {
        /// Which service was called.
        service: &'static str,
    },

    /// The request could not be sent or no response arrived.
    #[error("{service} request failed: {reason}")]
    Request {
        /// Which service was called.
        service: &'static str,
        /// Transport-level description.
        reason: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    HttpStatus {
        /// Which service was called.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("{service} response decode failed: {reason}")]
    Decode {
        /// Which service was called.
        service: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client build failed: {0}")]
    Build(String),
}
