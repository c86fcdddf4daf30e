//! Bounded byte capture and response bookkeeping.

use axum::http::StatusCode;
use bytes::BytesMut;

/// Bounded copy of a byte stream kept for logging.
///
/// Retains at most `limit` bytes while counting every byte pushed, so the true size is
/// always known even when the retained text is cut short.
#[derive(Debug, Clone)]
pub struct BodyCapture {
    limit: usize,
    retained: BytesMut,
    total: usize,
}

impl BodyCapture {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            retained: BytesMut::new(),
            total: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.total += chunk.len();
        let room = self.limit.saturating_sub(self.retained.len());
        if room > 0 {
            let keep = room.min(chunk.len());
            self.retained.extend_from_slice(&chunk[..keep]);
        }
    }

    /// True number of bytes pushed.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn retained(&self) -> &[u8] {
        &self.retained
    }

    pub fn is_truncated(&self) -> bool {
        self.total > self.limit
    }

    /// Summarize the capture for a log record.
    pub fn finish(&self) -> CapturedBody {
        CapturedBody {
            size: self.total,
            text: String::from_utf8_lossy(&self.retained).into_owned(),
            truncated_at: self.is_truncated().then_some(self.limit),
        }
    }
}

/// Logged view of a [`BodyCapture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedBody {
    /// True body size in bytes
    pub size: usize,
    /// Retained prefix, lossily decoded as UTF-8
    pub text: String,
    /// The cap, when the true size exceeded it
    pub truncated_at: Option<usize>,
}

/// Status and byte bookkeeping for one response.
///
/// Mirrors the semantics of a response writer: the first status set wins, and writing
/// bytes before any status implicitly finalizes the response as `200 OK`. A response
/// that never had a status set nor a byte written reports status `0`.
#[derive(Debug, Clone)]
pub struct ResponseCapture {
    status: u16,
    bytes_written: usize,
    body: Option<BodyCapture>,
}

impl ResponseCapture {
    /// `body_limit` enables body capture with the given cap.
    pub fn new(body_limit: Option<usize>) -> Self {
        Self {
            status: 0,
            bytes_written: 0,
            body: body_limit.map(BodyCapture::new),
        }
    }

    pub fn write_header(&mut self, status: StatusCode) {
        if self.status == 0 {
            self.status = status.as_u16();
        }
    }

    pub fn write(&mut self, chunk: &[u8]) {
        if self.status == 0 {
            self.status = StatusCode::OK.as_u16();
        }
        self.bytes_written += chunk.len();
        if let Some(body) = self.body.as_mut() {
            body.push(chunk);
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn body(&self) -> Option<&BodyCapture> {
        self.body.as_ref()
    }
}
