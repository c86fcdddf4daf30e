//! Per-request logging policies.
//!
//! A policy is consulted once per request, before any body is touched, and decides
//! whether the request is logged at all and which bodies are captured.
//!
//! ```rust
//! use httplog::policy::{LogDecision, LogPolicy};
//! use axum::extract::Request;
//!
//! // Skip health checks, capture request bodies on writes.
//! let policy = |request: &Request| match (request.method().as_str(), request.uri().path()) {
//!     (_, "/health") => LogDecision::SKIP,
//!     ("POST" | "PUT" | "PATCH", _) => LogDecision::REQUEST_BODY,
//!     _ => LogDecision::DEFAULT,
//! };
//!
//! let request = Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap();
//! assert!(!policy.decide(&request).log);
//! ```

use axum::extract::Request;

/// Outcome of a [`LogPolicy`] for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDecision {
    /// Emit a record for this request
    pub log: bool,
    /// Capture the request body into the record
    pub request_body: bool,
    /// Capture the response body into the record
    pub response_body: bool,
}

impl LogDecision {
    /// Log, capture nothing.
    pub const DEFAULT: Self = Self::new(true, false, false);
    /// Log and capture both bodies.
    pub const ALL: Self = Self::new(true, true, true);
    /// Log and capture the request body only.
    pub const REQUEST_BODY: Self = Self::new(true, true, false);
    /// Do not log.
    pub const SKIP: Self = Self::new(false, false, false);

    pub const fn new(log: bool, request_body: bool, response_body: bool) -> Self {
        Self {
            log,
            request_body,
            response_body,
        }
    }
}

impl Default for LogDecision {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decides what to log for a request.
pub trait LogPolicy: Send + Sync + 'static {
    fn decide(&self, request: &Request) -> LogDecision;
}

impl<F> LogPolicy for F
where
    F: Fn(&Request) -> LogDecision + Send + Sync + 'static,
{
    fn decide(&self, request: &Request) -> LogDecision {
        self(request)
    }
}

/// Logs every request without capturing bodies. Used when no policy is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl LogPolicy for DefaultPolicy {
    fn decide(&self, _request: &Request) -> LogDecision {
        LogDecision::DEFAULT
    }
}

/// Logs every request with both bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAll;

impl LogPolicy for LogAll {
    fn decide(&self, _request: &Request) -> LogDecision {
        LogDecision::ALL
    }
}

/// Logs every request with its request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRequestBodyOnly;

impl LogPolicy for LogRequestBodyOnly {
    fn decide(&self, _request: &Request) -> LogDecision {
        LogDecision::REQUEST_BODY
    }
}
