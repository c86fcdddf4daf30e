//! Data types for emitted log records.
//!
//! A [`LogRecord`] is the flat field mapping handed to a [`LogSink`](crate::LogSink) once per
//! logged request. Optional fields are absent, not null, when they do not apply.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::capture::CapturedBody;

/// Severity of a record, derived from its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `< 400` is info, `4xx` is warn, `>= 500` is error.
    pub fn from_status(status: u16) -> Self {
        match status {
            0..=399 => Self::Info,
            400..=499 => Self::Warn,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// One structured record describing a completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// HTTP method, verbatim
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// Incoming request headers; repeated names are joined with `", "`
    pub headers: BTreeMap<String, String>,
    /// Client-supplied request id, mirrored from the configured header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Operation name stored by the handler in its [`LogContext`](crate::LogContext)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Final status, `0` if no response was finalized
    pub status_code: u16,
    /// Response body bytes written to the client
    pub bytes_written: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_read: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_truncated_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_truncated_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,

    /// Elapsed time from dispatch to completion, in fractional milliseconds
    pub duration_ms: f64,
}

impl LogRecord {
    pub(crate) fn new(method: String, path: String, headers: BTreeMap<String, String>) -> Self {
        Self {
            method,
            path,
            headers,
            request_id: None,
            operation: None,
            status_code: 0,
            bytes_written: 0,
            bytes_read: None,
            request_size: None,
            request_truncated: None,
            request_truncated_size: None,
            request_body: None,
            request_body_error: None,
            response_size: None,
            response_truncated: None,
            response_truncated_size: None,
            response_body: None,
            duration_ms: 0.0,
        }
    }

    pub(crate) fn set_request_body(&mut self, body: CapturedBody) {
        self.bytes_read = Some(body.size);
        self.request_size = Some(body.size);
        self.request_body = Some(body.text);
        if let Some(limit) = body.truncated_at {
            self.request_truncated = Some(true);
            self.request_truncated_size = Some(limit);
        }
    }

    pub(crate) fn set_response_body(&mut self, body: CapturedBody) {
        self.response_size = Some(body.size);
        self.response_body = Some(body.text);
        if let Some(limit) = body.truncated_at {
            self.response_truncated = Some(true);
            self.response_truncated_size = Some(limit);
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_status(self.status_code)
    }

    /// `"<status_code> <method> <path>"`
    pub fn message(&self) -> String {
        format!("{} {} {}", self.status_code, self.method, self.path)
    }

    /// Flat field mapping of the record, including its derived `level` and `message`.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(fields)) => fields,
            _ => serde_json::Map::new(),
        };
        fields.insert("level".into(), self.level().as_str().into());
        fields.insert("message".into(), self.message().into());
        fields
    }
}
