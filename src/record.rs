//! Per-request record assembly.
//!
//! A [`PendingRecord`] is created when a logged request is dispatched and collects data in
//! two phases: request metadata and the optional request body before the handler runs,
//! then status, byte counts and the optional response body while the response streams.
//! It is flushed to the sink exactly once, when it is dropped. Dropping covers every way
//! a request can end: the response body finishing, the server discarding the body, the
//! downstream service failing, or the response future being cancelled.

use axum::{extract::Request, http::HeaderMap};
use std::{collections::BTreeMap, sync::Arc, time::Instant};

use crate::{
    capture::{BodyCapture, ResponseCapture},
    clock::Clock,
    context::LogContext,
    error::BodyCaptureError,
    policy::LogDecision,
    sink::LogSink,
    types::LogRecord,
    RequestLoggerConfig,
};

/// Result of capturing a request body.
#[derive(Debug)]
pub(crate) enum RequestBodyOutcome {
    Captured(BodyCapture),
    Failed(BodyCaptureError),
}

pub(crate) struct PendingRecord {
    record: LogRecord,
    started: Instant,
    context: LogContext,
    request_body: Option<RequestBodyOutcome>,
    pub(crate) response: ResponseCapture,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
}

impl PendingRecord {
    pub(crate) fn new(
        request: &Request,
        decision: LogDecision,
        config: &RequestLoggerConfig,
        context: LogContext,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let started = clock.now();
        let mut record = LogRecord::new(
            request.method().to_string(),
            request.uri().path().to_string(),
            convert_headers(request.headers()),
        );
        record.request_id = request
            .headers()
            .get(&config.request_id_header)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        let body_limit = decision.response_body.then_some(config.max_body_log);

        Self {
            record,
            started,
            context,
            request_body: None,
            response: ResponseCapture::new(body_limit),
            clock,
            sink,
        }
    }

    pub(crate) fn set_request_body(&mut self, outcome: RequestBodyOutcome) {
        self.request_body = Some(outcome);
    }

    fn assemble(&mut self) -> LogRecord {
        let mut record = self.record.clone();

        match self.request_body.take() {
            Some(RequestBodyOutcome::Captured(capture)) => record.set_request_body(capture.finish()),
            Some(RequestBodyOutcome::Failed(error)) => {
                record.request_body_error = Some(error.to_string())
            }
            None => {}
        }

        record.status_code = self.response.status();
        record.bytes_written = self.response.bytes_written();
        if let Some(body) = self.response.body() {
            record.set_response_body(body.finish());
        }

        record.operation = self.context.operation();
        let elapsed = self.clock.now().saturating_duration_since(self.started);
        record.duration_ms = elapsed.as_nanos() as f64 / 1_000_000.0;

        record
    }
}

impl Drop for PendingRecord {
    fn drop(&mut self) {
        let record = self.assemble();
        self.sink.emit(record.level(), &record);
    }
}

/// Flatten a header map to name → value, joining repeated names with `", "`.
fn convert_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut result: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        result
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    result
}
