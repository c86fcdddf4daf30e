use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use httplog::{LogContext, LogDecision, RequestLoggerConfig, RequestLoggerLayer, TracingSink};
use std::time::Duration;
use tokio::{net::TcpListener, time::sleep};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Test handlers for our demo server
async fn hello_handler(ctx: LogContext) -> impl IntoResponse {
    ctx.set_operation("greeting");
    sleep(Duration::from_millis(100)).await; // Simulate some work
    "Hello, World!"
}

async fn echo_handler(ctx: LogContext, body: Bytes) -> impl IntoResponse {
    ctx.set_operation("echo");
    sleep(Duration::from_millis(50)).await; // Simulate some work
    format!("Echo: {}", String::from_utf8_lossy(&body))
}

async fn streaming_handler() -> Response {
    use futures::stream;
    use tokio::time::interval;

    let stream = stream::unfold(0u32, |count| async move {
        if count >= 5 {
            None
        } else {
            let mut interval = interval(Duration::from_millis(200));
            interval.tick().await;
            Some((
                Ok::<_, std::convert::Infallible>(Bytes::from(format!("chunk-{count}\n"))),
                count + 1,
            ))
        }
    });

    (
        [("content-type", "text/plain")],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn large_response_handler() -> impl IntoResponse {
    // Larger than the demo's capture cap, so the record shows truncation
    "x".repeat(2048)
}

async fn missing_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such thing")
}

async fn failing_handler() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "try later")
}

/// Capture bodies everywhere except the streaming endpoint, and skip health checks.
fn demo_policy(request: &Request) -> LogDecision {
    match request.uri().path() {
        "/health" => LogDecision::SKIP,
        "/streaming" => LogDecision::DEFAULT,
        _ => LogDecision::ALL,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Records are emitted as tracing events; render them as JSON lines
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,httplog=debug")),
        )
        .init();

    info!("Starting request logger demo server");

    let config = RequestLoggerConfig::from_env()?.with_max_body_log(256);

    let app = Router::new()
        .route("/hello", get(hello_handler))
        .route("/echo", post(echo_handler))
        .route("/streaming", get(streaming_handler))
        .route("/large", get(large_response_handler))
        .route("/missing", get(missing_handler))
        .route("/failing", get(failing_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    RequestLoggerLayer::new(config)
                        .with_policy(demo_policy)
                        .with_sink(TracingSink),
                )
                .into_inner(),
        );

    info!("Demo server endpoints:");
    info!("  GET  /hello      - Simple greeting (info)");
    info!("  POST /echo       - Echo request body");
    info!("  GET  /streaming  - Streaming response, bodies not captured");
    info!("  GET  /large      - Large response (truncated in the record)");
    info!("  GET  /missing    - 404 (warn)");
    info!("  GET  /failing    - 503 (error)");
    info!("  GET  /health     - Not logged");
    info!("");
    info!("Try these commands:");
    info!("  curl http://localhost:3000/hello");
    info!("  curl -X POST -H 'x-request-id: demo-1' -d 'Hello from client' http://localhost:3000/echo");
    info!("  curl http://localhost:3000/streaming");
    info!("  curl http://localhost:3000/large");

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("Demo server listening on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
