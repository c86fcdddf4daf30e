//! Request and response body interception.
//!
//! Request bodies are drained eagerly: every frame is read into an owned buffer before the
//! handler runs, a bounded copy is kept for the log record, and the handler receives a
//! fresh body built over the bytes that were read. Response bodies are wrapped instead, so
//! frames stream to the client untouched while their bytes are counted and captured.

use axum::{
    body::{Body, Bytes, HttpBody},
    http::HeaderMap,
};
use bytes::BytesMut;
use http_body::{Frame, SizeHint};
use http_body_util::{BodyExt, Full};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{ready, Context, Poll},
};
use tracing::{debug, warn};

use crate::{
    capture::BodyCapture,
    error::BodyCaptureError,
    record::{PendingRecord, RequestBodyOutcome},
};

/// Operation name reported when reading a request body fails.
pub const READ_BODY_OPERATION: &str = "read_body";

/// Drains `body`, capturing at most `limit` bytes.
///
/// Returns a replacement body carrying every byte read (and trailers, if any) together with
/// the capture outcome. A read error stops the drain; the replacement then carries the
/// bytes read before the failure and the error is reported in the outcome instead of
/// being propagated.
///
/// # Examples
///
/// ```rust
/// use httplog::body_wrapper::capture_request_body;
/// use axum::body::Body;
/// use http_body_util::BodyExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (replay, captured) = capture_request_body(Body::from("12345678901"), 10).await;
/// let captured = captured?;
/// assert_eq!(captured.total(), 11);
/// assert_eq!(captured.retained(), b"1234567890");
///
/// // The replacement body still carries the full content
/// assert_eq!(replay.collect().await?.to_bytes(), "12345678901");
/// # Ok(())
/// # }
/// ```
pub async fn capture_request_body(
    mut body: Body,
    limit: usize,
) -> (Body, Result<BodyCapture, BodyCaptureError>) {
    let mut buffered = BytesMut::new();
    let mut capture = BodyCapture::new(limit);
    let mut trailers: Option<HeaderMap> = None;
    let mut failure = None;

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => match frame.into_data() {
                Ok(data) => {
                    capture.push(&data);
                    buffered.extend_from_slice(&data);
                }
                Err(frame) => {
                    if let Ok(frame_trailers) = frame.into_trailers() {
                        trailers
                            .get_or_insert_with(HeaderMap::new)
                            .extend(frame_trailers);
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, bytes_read = capture.total(), "Error reading request body for capture");
                failure = Some(BodyCaptureError::read(READ_BODY_OPERATION, e));
                break;
            }
        }
    }

    debug!(bytes_read = capture.total(), "Request body drained");

    let replay = replay_body(buffered.freeze(), trailers);
    match failure {
        Some(error) => (replay, Err(error)),
        None => (replay, Ok(capture)),
    }
}

fn replay_body(bytes: Bytes, trailers: Option<HeaderMap>) -> Body {
    match trailers {
        Some(trailers) => Body::new(
            Full::new(bytes).with_trailers(async move { Some(Ok::<_, Infallible>(trailers)) }),
        ),
        None => Body::from(bytes),
    }
}

impl From<Result<BodyCapture, BodyCaptureError>> for RequestBodyOutcome {
    fn from(result: Result<BodyCapture, BodyCaptureError>) -> Self {
        match result {
            Ok(capture) => Self::Captured(capture),
            Err(error) => Self::Failed(error),
        }
    }
}

/// Response body that reports its frames to a pending record.
///
/// Every data frame passes through unchanged and is fed to the record's response capture.
/// The record is released, and therefore flushed, when the stream ends or fails, or when
/// the body is dropped before completion.
pub(crate) struct LoggedBody {
    inner: Body,
    record: Option<PendingRecord>,
}

impl LoggedBody {
    pub(crate) fn new(inner: Body, record: PendingRecord) -> Self {
        Self {
            inner,
            record: Some(record),
        }
    }
}

impl HttpBody for LoggedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = ready!(Pin::new(&mut this.inner).poll_frame(cx));

        match &polled {
            Some(Ok(frame)) => {
                if let (Some(data), Some(record)) = (frame.data_ref(), this.record.as_mut()) {
                    record.response.write(data);
                }
            }
            Some(Err(e)) => {
                debug!(error = %e, "Response body stream failed");
                drop(this.record.take());
            }
            None => drop(this.record.take()),
        }

        Poll::Ready(polled)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
