use axum::{
    body::{Body, Bytes},
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Router,
};
use futures::stream;
use http_body_util::BodyExt;
use httplog::{
    Clock, LogAll, LogContext, LogDecision, LogLevel, LogRecord, LogRequestBodyOnly, LogSink,
    RequestLoggerConfig, RequestLoggerLayer,
};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tower::{Layer, ServiceExt};

/// Sink that keeps every emitted record for verification
#[derive(Debug, Clone, Default)]
struct CollectingSink {
    records: Arc<Mutex<Vec<(LogLevel, LogRecord)>>>,
}

impl CollectingSink {
    fn records(&self) -> Vec<(LogLevel, LogRecord)> {
        self.records.lock().unwrap().clone()
    }

    fn only(&self) -> (LogLevel, LogRecord) {
        let records = self.records();
        assert_eq!(records.len(), 1, "expected exactly one record");
        records.into_iter().next().unwrap()
    }

    /// The single record as a flat field map, `level` and `message` included
    fn only_fields(&self) -> Value {
        Value::Object(self.only().1.to_fields())
    }
}

impl LogSink for CollectingSink {
    fn emit(&self, level: LogLevel, record: &LogRecord) {
        self.records.lock().unwrap().push((level, record.clone()));
    }
}

/// Clock that only moves when a handler advances it
#[derive(Debug, Clone)]
struct TestClock {
    now: Arc<Mutex<Instant>>,
}

impl TestClock {
    fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

const HANDLER_TIME: Duration = Duration::from_micros(100);

// Test server handlers
async fn empty_handler(State(clock): State<TestClock>, ctx: LogContext) {
    clock.advance(HANDLER_TIME);
    ctx.set_operation("empty");
}

async fn no_op_handler(State(clock): State<TestClock>) {
    clock.advance(HANDLER_TIME);
}

async fn body_handler(State(clock): State<TestClock>) -> &'static str {
    clock.advance(HANDLER_TIME);
    "TEST"
}

async fn echo_handler(State(clock): State<TestClock>, body: Bytes) -> Bytes {
    clock.advance(HANDLER_TIME);
    body
}

async fn status_handler(State(clock): State<TestClock>, Path(code): Path<u16>) -> Response {
    clock.advance(HANDLER_TIME);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "TEST STATUS").into_response()
}

async fn streaming_handler(State(clock): State<TestClock>) -> Response {
    clock.advance(HANDLER_TIME);
    let stream = stream::iter(vec![
        Ok::<_, std::convert::Infallible>(Bytes::from("chunk1")),
        Ok(Bytes::from("chunk2")),
        Ok(Bytes::from("chunk3")),
    ]);
    Response::builder()
        .header("content-type", "text/plain")
        .body(Body::from_stream(stream))
        .unwrap()
}

fn create_test_app(layer: RequestLoggerLayer, clock: TestClock) -> Router {
    Router::new()
        .route("/empty", any(empty_handler))
        .route("/no-op", any(no_op_handler))
        .route("/body", any(body_handler))
        .route("/echo", any(echo_handler))
        .route("/status/{code}", get(status_handler))
        .route("/streaming", get(streaming_handler))
        .route("/items", post(echo_handler))
        .layer(layer.with_clock(clock.clone()))
        .with_state(clock)
}

fn setup(config: RequestLoggerConfig) -> (CollectingSink, TestClock, RequestLoggerLayer) {
    let sink = CollectingSink::default();
    let layer = RequestLoggerLayer::new(config).with_sink(sink.clone());
    (sink, TestClock::new(), layer)
}

fn small_config() -> RequestLoggerConfig {
    RequestLoggerConfig::default().with_max_body_log(10)
}

fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request) -> (StatusCode, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn test_default_policy_logs_without_bodies() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer, clock);

    let mut req = request("FOO", "/empty", "DO NOT LOG ME");
    req.headers_mut()
        .insert("x-request-id", "default logs".parse().unwrap());
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    assert_eq!(
        sink.only_fields(),
        json!({
            "level": "info",
            "method": "FOO",
            "path": "/empty",
            "headers": { "x-request-id": "default logs" },
            "request_id": "default logs",
            "operation": "empty",
            "status_code": 200,
            "bytes_written": 0,
            "duration_ms": 0.1,
            "message": "200 FOO /empty",
        })
    );
}

#[tokio::test]
async fn test_operation_absent_when_not_set() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer, clock);

    send(app, request("FOO", "/no-op", "DO NOT LOG ME")).await;

    let (_, record) = sink.only();
    assert_eq!(record.operation, None);
    assert_eq!(record.request_id, None);
    assert!(record.headers.is_empty());
}

#[tokio::test]
async fn test_status_maps_to_level() {
    for (code, level) in [
        (200, LogLevel::Info),
        (302, LogLevel::Info),
        (404, LogLevel::Warn),
        (503, LogLevel::Error),
    ] {
        let (sink, clock, layer) = setup(small_config());
        let app = create_test_app(layer, clock);

        let (status, body) = send(app, request("GET", &format!("/status/{code}"), "")).await;
        assert_eq!(status.as_u16(), code);
        assert_eq!(body, "TEST STATUS");

        let (emitted_level, record) = sink.only();
        assert_eq!(emitted_level, level);
        assert_eq!(record.status_code, code);
        assert_eq!(record.bytes_written, 11);
        assert_eq!(record.message(), format!("{code} GET /status/{code}"));
    }
}

#[tokio::test]
async fn test_policy_can_suppress_logging() {
    let (sink, clock, layer) = setup(small_config());
    let layer = layer.with_policy(|_: &Request| LogDecision::SKIP);
    let app = create_test_app(layer, clock);

    let (status, body) = send(app, request("POST", "/echo", "DO NOT LOG ME")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "DO NOT LOG ME");
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_log_all_captures_both_bodies() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogAll), clock);

    let (_, body) = send(app, request("FOO", "/body", "LOG ME")).await;
    assert_eq!(body, "TEST");

    assert_eq!(
        sink.only_fields(),
        json!({
            "level": "info",
            "method": "FOO",
            "path": "/body",
            "headers": {},
            "bytes_read": 6,
            "request_size": 6,
            "request_body": "LOG ME",
            "response_size": 4,
            "response_body": "TEST",
            "status_code": 200,
            "bytes_written": 4,
            "duration_ms": 0.1,
            "message": "200 FOO /body",
        })
    );
}

#[tokio::test]
async fn test_request_body_only() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogRequestBodyOnly), clock);

    let (_, body) = send(app, request("FOO", "/echo", "LOG ME")).await;
    assert_eq!(body, "LOG ME");

    assert_eq!(
        sink.only_fields(),
        json!({
            "level": "info",
            "method": "FOO",
            "path": "/echo",
            "headers": {},
            "bytes_read": 6,
            "request_size": 6,
            "request_body": "LOG ME",
            "status_code": 200,
            "bytes_written": 6,
            "duration_ms": 0.1,
            "message": "200 FOO /echo",
        })
    );
}

#[tokio::test]
async fn test_response_body_only() {
    let (sink, clock, layer) = setup(small_config());
    let layer = layer.with_policy(|_: &Request| LogDecision::new(true, false, true));
    let app = create_test_app(layer, clock);

    send(app, request("FOO", "/body", "LOG ME")).await;

    let (_, record) = sink.only();
    assert_eq!(record.bytes_read, None);
    assert_eq!(record.request_size, None);
    assert_eq!(record.request_body, None);
    assert_eq!(record.response_size, Some(4));
    assert_eq!(record.response_body.as_deref(), Some("TEST"));
    assert_eq!(record.bytes_written, 4);
}

#[tokio::test]
async fn test_request_body_too_big() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogRequestBodyOnly), clock);

    // The handler still sees and echoes the whole body
    let (_, body) = send(app, request("FOO", "/echo", "12345678901")).await;
    assert_eq!(body, "12345678901");

    assert_eq!(
        sink.only_fields(),
        json!({
            "level": "info",
            "method": "FOO",
            "path": "/echo",
            "headers": {},
            "bytes_read": 11,
            "request_size": 11,
            "request_body": "1234567890",
            "request_truncated": true,
            "request_truncated_size": 10,
            "status_code": 200,
            "bytes_written": 11,
            "duration_ms": 0.1,
            "message": "200 FOO /echo",
        })
    );
}

#[tokio::test]
async fn test_request_body_read_error() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogRequestBodyOnly), clock);

    let failing = stream::iter(vec![Err::<Bytes, _>(std::io::Error::other("BadReader"))]);
    let (status, body) = send(app, request("FOO", "/echo", Body::from_stream(failing))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    assert_eq!(
        sink.only_fields(),
        json!({
            "level": "info",
            "method": "FOO",
            "path": "/echo",
            "headers": {},
            "request_body_error": "read_body:BadReader",
            "status_code": 200,
            "bytes_written": 0,
            "duration_ms": 0.1,
            "message": "200 FOO /echo",
        })
    );
}

#[tokio::test]
async fn test_streaming_response_truncated() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogAll), clock);

    let (_, body) = send(app, request("GET", "/streaming", Body::empty())).await;
    assert_eq!(body, "chunk1chunk2chunk3");

    let (_, record) = sink.only();
    assert_eq!(record.bytes_written, 18);
    assert_eq!(record.response_size, Some(18));
    assert_eq!(record.response_body.as_deref(), Some("chunk1chun"));
    assert_eq!(record.response_truncated, Some(true));
    assert_eq!(record.response_truncated_size, Some(10));
}

#[tokio::test]
async fn test_zero_cap_still_measures() {
    let (sink, clock, layer) = setup(RequestLoggerConfig::default().with_max_body_log(-1));
    let app = create_test_app(layer.with_policy(LogAll), clock);

    send(app, request("POST", "/echo", "LOG ME")).await;

    let (_, record) = sink.only();
    assert_eq!(record.request_size, Some(6));
    assert_eq!(record.request_body.as_deref(), Some(""));
    assert_eq!(record.request_truncated_size, Some(0));
    assert_eq!(record.response_size, Some(6));
    assert_eq!(record.bytes_written, 6);
}

#[tokio::test]
async fn test_inner_error_logs_status_zero() {
    let sink = CollectingSink::default();
    let layer = RequestLoggerLayer::default().with_sink(sink.clone());
    let service = layer.layer(tower::service_fn(|_: Request| async {
        Err::<Response, _>(std::io::Error::other("boom"))
    }));

    match service.oneshot(request("GET", "/fail", Body::empty())).await {
        Err(e) => assert_eq!(e.to_string(), "boom"),
        Ok(_) => panic!("inner error must pass through"),
    }

    let (level, record) = sink.only();
    assert_eq!(level, LogLevel::Info);
    assert_eq!(record.status_code, 0);
    assert_eq!(record.bytes_written, 0);
    assert_eq!(record.message(), "0 GET /fail");
}

#[tokio::test]
async fn test_cancelled_request_logs_once() {
    let sink = CollectingSink::default();
    let layer = RequestLoggerLayer::default().with_sink(sink.clone());
    let service = layer.layer(tower::service_fn(|_: Request| async {
        std::future::pending::<Result<Response, std::convert::Infallible>>().await
    }));

    let pending = service.oneshot(request("GET", "/slow", Body::empty()));
    let result = tokio::time::timeout(Duration::from_millis(20), pending).await;
    assert!(result.is_err());

    let (_, record) = sink.only();
    assert_eq!(record.status_code, 0);
}

#[tokio::test]
async fn test_dropped_response_body_logs_once() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogAll), clock);

    let response = app
        .oneshot(request("GET", "/streaming", Body::empty()))
        .await
        .unwrap();
    assert!(sink.records().is_empty());
    drop(response);

    let (_, record) = sink.only();
    assert_eq!(record.status_code, 200);
    assert_eq!(record.bytes_written, 0);
    assert_eq!(record.response_size, Some(0));
}

#[tokio::test]
async fn test_request_body_capture_through_server() {
    let (sink, clock, layer) = setup(small_config());
    let app = create_test_app(layer.with_policy(LogRequestBodyOnly), clock);
    let server = axum_test::TestServer::new(app).unwrap();

    let response = server.post("/items").text("12345678901").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "12345678901");

    let (_, record) = sink.only();
    assert_eq!(record.method, "POST");
    assert_eq!(record.path, "/items");
    assert_eq!(record.request_size, Some(11));
    assert_eq!(record.request_truncated, Some(true));
    assert_eq!(record.request_truncated_size, Some(10));
    assert_eq!(record.request_body.as_deref(), Some("1234567890"));
    assert_eq!(record.bytes_written, 11);
}

#[tokio::test]
async fn test_multiple_concurrent_requests() {
    let (sink, clock, layer) = setup(RequestLoggerConfig::default());
    let app = create_test_app(layer.with_policy(LogAll), clock);
    let server = Arc::new(axum_test::TestServer::new(app).unwrap());

    use futures::future::join_all;

    let futures: Vec<_> = (0..5)
        .map(|i| {
            let server = server.clone();
            async move { server.post("/items").text(format!("Request {i}")).await }
        })
        .collect();

    let responses = join_all(futures).await;
    for (i, response) in responses.iter().enumerate() {
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), format!("Request {i}"));
    }

    let records = sink.records();
    assert_eq!(records.len(), 5);
    for (_, record) in &records {
        assert_eq!(record.request_body, record.response_body);
        assert_eq!(record.request_size, Some(record.bytes_written));
    }
}

#[tokio::test]
async fn test_middleware_passthrough() {
    let (sink, clock, layer) = setup(RequestLoggerConfig::default());
    let app = create_test_app(layer.with_policy(LogAll), clock);
    let server = axum_test::TestServer::new(app).unwrap();

    let body_response = server.get("/body").await;
    assert_eq!(body_response.status_code(), StatusCode::OK);
    assert_eq!(body_response.text(), "TEST");

    let streaming_response = server.get("/streaming").await;
    assert_eq!(streaming_response.status_code(), StatusCode::OK);
    assert_eq!(streaming_response.text(), "chunk1chunk2chunk3");
    assert_eq!(streaming_response.header("content-type"), "text/plain");

    let missing = server.get("/missing").expect_failure().await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let records = sink.records();
    assert_eq!(records.len(), 3);
    let (level, record) = &records[2];
    assert_eq!(*level, LogLevel::Warn);
    assert_eq!(record.message(), "404 GET /missing");
}
