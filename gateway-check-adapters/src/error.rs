//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when looking up a gateway's status.
#[derive(Debug, Error)]
pub enum LookupError {
    /// HTTP request failed or returned an unexpected status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Neither identifier format is known to the remote service.
    #[error("Gateway not found via remote service (tried '{primary}' and '{fallback}')")]
    NotFound { primary: String, fallback: String },

    /// The response carried no usable timestamp.
    #[error("Gateway not found via remote service: response has no timestamp")]
    MissingTimestamp,

    /// The timestamp could not be parsed.
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// A required field other than the timestamp was absent.
    #[error("Response is missing required field '{0}'")]
    MissingField(&'static str),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,
}

/// Errors that can occur when writing a sample to a metric sink.
#[derive(Debug, Error)]
pub enum WriteError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The store answered but refused the write.
    #[error("Write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The sink refused the write without contacting a store.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// The point cannot be encoded as a single line.
    #[error("Invalid point: {0}")]
    InvalidPoint(String),
}

/// Errors that can occur when building an adapter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The endpoint is not a valid URL.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(any(feature = "noc", feature = "influxdb"))]
impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else if err.is_connect() {
            LookupError::Connection(err.to_string())
        } else if err.is_decode() {
            LookupError::Parse(err.to_string())
        } else {
            LookupError::Http(err.to_string())
        }
    }
}

#[cfg(any(feature = "noc", feature = "influxdb"))]
impl From<reqwest::Error> for WriteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WriteError::Timeout
        } else if err.is_connect() {
            WriteError::Connection(err.to_string())
        } else {
            WriteError::Http(err.to_string())
        }
    }
}

#[cfg(any(feature = "noc", feature = "influxdb"))]
impl From<reqwest::Error> for BuildError {
    fn from(err: reqwest::Error) -> Self {
        BuildError::Client(err.to_string())
    }
}
