//! # httplog
//!
//! An Axum/Tower middleware that emits one structured log record per request, with optional
//! size-bounded capture of request and response bodies.
//!
//! ## Features
//!
//! - **Transparent**: handlers see the full request body and clients see the handler's
//!   response unchanged, whatever is captured
//! - **Policy driven**: a per-request [`LogPolicy`] decides whether to log and which bodies
//!   to capture; skipped requests take a fast path with no capture work at all
//! - **Bounded capture**: at most [`RequestLoggerConfig::max_body_log`] bytes are retained per
//!   body, while true sizes are always reported
//! - **Pluggable**: records go to any [`LogSink`]; time comes from any [`Clock`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::post, Router};
//! use httplog::{request_logger, LogContext, LogRequestBodyOnly};
//!
//! async fn create(ctx: LogContext, body: String) -> String {
//!     ctx.set_operation("items.create");
//!     body
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/items", post(create))
//!         .layer(request_logger(LogRequestBodyOnly));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! Each logged request yields a record like:
//!
//! ```text
//! level=warn method=POST path=/items status_code=404 bytes_written=9 duration_ms=0.42
//!     request_size=6 request_body="LOG ME" operation=items.create  "404 POST /items"
//! ```
//!
//! ## Custom Sinks
//!
//! Implement [`LogSink`] (or pass a closure) to deliver records somewhere other than
//! `tracing`:
//!
//! ```rust
//! use httplog::{LogLevel, LogRecord, LogSink};
//!
//! #[derive(Debug)]
//! struct StdoutSink;
//!
//! impl LogSink for StdoutSink {
//!     fn emit(&self, level: LogLevel, record: &LogRecord) {
//!         println!("{} {}", level.as_str(), serde_json::Value::Object(record.to_fields()));
//!     }
//! }
//! ```

use axum::{body::Body, extract::Request, response::Response};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, instrument};

pub mod body_wrapper;
use body_wrapper::{capture_request_body, LoggedBody};

pub mod capture;

pub mod clock;
pub use clock::{Clock, SystemClock};

pub mod config;
pub use config::RequestLoggerConfig;

pub mod context;
pub use context::LogContext;

pub mod error;
pub use error::{BodyCaptureError, ConfigError};

pub mod policy;
pub use policy::{DefaultPolicy, LogAll, LogDecision, LogPolicy, LogRequestBodyOnly};

mod record;
use record::PendingRecord;

pub mod sink;
pub use sink::{LogSink, TracingSink};

pub mod types;
pub use types::{LogLevel, LogRecord};

/// Build a [`RequestLoggerLayer`] with the default configuration and the given policy.
///
/// Equivalent to `RequestLoggerLayer::new(RequestLoggerConfig::default()).with_policy(policy)`.
pub fn request_logger<P: LogPolicy>(policy: P) -> RequestLoggerLayer {
    RequestLoggerLayer::new(RequestLoggerConfig::default()).with_policy(policy)
}

/// Tower layer for the request logging middleware.
///
/// This is the main entry point. It implements the Tower [`Layer`] trait and can be used
/// with Axum's layering system. Without further setup it logs every request through
/// [`TracingSink`] using [`DefaultPolicy`] and the [`SystemClock`].
///
/// # Examples
///
/// ```rust,no_run
/// use httplog::{LogAll, RequestLoggerConfig, RequestLoggerLayer, TracingSink};
/// use axum::{routing::get, Router};
/// use tower::ServiceBuilder;
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let config = RequestLoggerConfig::default().with_max_body_log(1024);
/// let layer = RequestLoggerLayer::new(config)
///     .with_policy(LogAll)
///     .with_sink(TracingSink);
///
/// let app = Router::new()
///     .route("/hello", get(hello))
///     .layer(ServiceBuilder::new().layer(layer));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(listener, app).await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct RequestLoggerLayer {
    config: Arc<RequestLoggerConfig>,
    policy: Arc<dyn LogPolicy>,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
}

impl RequestLoggerLayer {
    pub fn new(config: RequestLoggerConfig) -> Self {
        Self {
            config: Arc::new(config),
            policy: Arc::new(DefaultPolicy),
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Decide per request what gets logged.
    pub fn with_policy<P: LogPolicy>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Send records to `sink` instead of `tracing`.
    pub fn with_sink<K: LogSink>(mut self, sink: K) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Measure durations with `clock`.
    pub fn with_clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &RequestLoggerConfig {
        &self.config
    }
}

impl Default for RequestLoggerLayer {
    fn default() -> Self {
        Self::new(RequestLoggerConfig::default())
    }
}

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLoggerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggerService {
            inner,
            config: self.config.clone(),
            policy: self.policy.clone(),
            sink: self.sink.clone(),
            clock: self.clock.clone(),
        }
    }
}

/// Tower service implementation for the request logging middleware.
///
/// Wraps an inner service, consults the policy, optionally drains and replays the request
/// body, and wraps the response body so the record is flushed once the response has been
/// fully produced.
///
/// Users typically don't interact with this type directly - it's created by
/// [`RequestLoggerLayer`].
#[derive(Clone)]
pub struct RequestLoggerService<S> {
    inner: S,
    config: Arc<RequestLoggerConfig>,
    policy: Arc<dyn LogPolicy>,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
}

impl<S> Service<Request> for RequestLoggerService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, mut request: Request) -> Self::Future {
        let decision = self.policy.decide(&request);

        if !decision.log {
            debug!("Request logging skipped by policy");
            return Box::pin(self.inner.call(request));
        }

        let context = LogContext::default();
        request.extensions_mut().insert(context.clone());

        let mut record = PendingRecord::new(
            &request,
            decision,
            &self.config,
            context,
            self.clock.clone(),
            self.sink.clone(),
        );

        debug!(
            method = %request.method(),
            uri = %request.uri(),
            capture_request_body = decision.request_body,
            capture_response_body = decision.response_body,
            "Logging request"
        );

        // The ready service handles this request; a fresh clone takes its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let max_body_log = self.config.max_body_log;

        Box::pin(async move {
            if decision.request_body {
                let body = std::mem::replace(request.body_mut(), Body::empty());
                let (replay, outcome) = capture_request_body(body, max_body_log).await;
                *request.body_mut() = replay;
                record.set_request_body(outcome.into());
            }

            // On error the record is dropped here and flushed with status 0.
            let response = inner.call(request).await?;

            let (parts, body) = response.into_parts();
            record.response.write_header(parts.status);
            debug!(status = %parts.status, "Wrapping response body for capture");

            Ok(Response::from_parts(
                parts,
                Body::new(LoggedBody::new(body, record)),
            ))
        })
    }
}
