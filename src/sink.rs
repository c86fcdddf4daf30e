//! Destinations for emitted records.
//!
//! The middleware hands each finished [`LogRecord`] to a [`LogSink`] exactly once.
//! Serialization and delivery are the sink's concern. [`TracingSink`] is the default and
//! emits one `tracing` event per record; any `Fn(LogLevel, &LogRecord)` closure also works.

use tracing::event;

use crate::types::{LogLevel, LogRecord};

/// Event target used by [`TracingSink`].
pub const TARGET: &str = "httplog";

/// Receives one record per logged request.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, level: LogLevel, record: &LogRecord);
}

impl<F> LogSink for F
where
    F: Fn(LogLevel, &LogRecord) + Send + Sync + 'static,
{
    fn emit(&self, level: LogLevel, record: &LogRecord) {
        self(level, record)
    }
}

/// Sink that emits records as structured `tracing` events.
///
/// Each present record field becomes an event field; the headers map is rendered as a
/// JSON object. The event message is the record message, e.g. `"404 GET /users/7"`.
///
/// # Examples
///
/// ```rust,no_run
/// use httplog::{RequestLoggerConfig, RequestLoggerLayer, TracingSink};
///
/// let layer = RequestLoggerLayer::new(RequestLoggerConfig::default()).with_sink(TracingSink);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! record_event {
    ($level:expr, $record:ident, $headers:ident) => {
        event!(
            target: TARGET,
            $level,
            method = %$record.method,
            path = %$record.path,
            headers = %$headers,
            request_id = $record.request_id.as_deref(),
            operation = $record.operation.as_deref(),
            status_code = $record.status_code,
            bytes_written = $record.bytes_written,
            bytes_read = $record.bytes_read,
            request_size = $record.request_size,
            request_truncated = $record.request_truncated,
            request_truncated_size = $record.request_truncated_size,
            request_body = $record.request_body.as_deref(),
            request_body_error = $record.request_body_error.as_deref(),
            response_size = $record.response_size,
            response_truncated = $record.response_truncated,
            response_truncated_size = $record.response_truncated_size,
            response_body = $record.response_body.as_deref(),
            duration_ms = $record.duration_ms,
            "{}",
            $record.message()
        )
    };
}

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, record: &LogRecord) {
        let headers = serde_json::to_string(&record.headers).unwrap_or_default();
        match level {
            LogLevel::Info => record_event!(tracing::Level::INFO, record, headers),
            LogLevel::Warn => record_event!(tracing::Level::WARN, record, headers),
            LogLevel::Error => record_event!(tracing::Level::ERROR, record, headers),
        }
    }
}
