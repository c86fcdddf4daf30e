//! Error types for body capture and configuration.

/// Error type for body capture operations.
///
/// Capture errors are never surfaced to the HTTP client. They end up as a string
/// field on the log record, formatted as `"<operation>:<message>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyCaptureError {
    #[error("{operation}:{message}")]
    Read {
        operation: &'static str,
        message: String,
    },
}

impl BodyCaptureError {
    pub(crate) fn read(operation: &'static str, source: impl std::fmt::Display) -> Self {
        Self::Read {
            operation,
            message: source.to_string(),
        }
    }
}

/// Error type for loading [`RequestLoggerConfig`](crate::RequestLoggerConfig) from the
/// environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: expected an integer")]
    InvalidInteger { key: &'static str, value: String },
    #[error("invalid header name {value:?} for {key}")]
    InvalidHeaderName {
        key: &'static str,
        value: String,
        #[source]
        source: axum::http::header::InvalidHeaderName,
    },
}
