//! Object store reached through presigned PUT URLs.

use std::time::Duration;

use bytes::Bytes;
use clipdrop_uploader::{BoxFuture, ByteProgress, ObjectStore, PutResponse, TransportError};
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use tracing::debug;

use crate::STREAM_SLICE;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// PUTs bodies to presigned URLs.
///
/// No request timeout is set here; the engine bounds each attempt itself.
pub struct PresignedPutStore {
    http: reqwest::Client,
    slice_size: usize,
}

impl PresignedPutStore {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            slice_size: STREAM_SLICE,
        }
    }

    /// Streams bodies in slices of `size` bytes (progress granularity).
    pub fn with_slice_size(mut self, size: usize) -> Self {
        self.slice_size = size.max(1);
        self
    }

    async fn put_body(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        progress: ByteProgress,
    ) -> Result<PutResponse, TransportError> {
        let total = body.len() as u64;
        progress(0, total);

        // Presigned PUTs do not accept chunked encoding, so the length is
        // always sent explicitly.
        let resp = self
            .http
            .put(url)
            .header(CONTENT_LENGTH, total)
            .header(CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(progress_stream(
                body,
                self.slice_size,
                progress,
            )))
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "PUT rejected");
            return Err(TransportError::Status(status.as_u16()));
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(PutResponse {
            status: status.as_u16(),
            etag,
        })
    }
}

impl ObjectStore for PresignedPutStore {
    fn put<'a>(
        &'a self,
        url: &'a str,
        body: Bytes,
        content_type: &'a str,
        progress: ByteProgress,
    ) -> BoxFuture<'a, Result<PutResponse, TransportError>> {
        Box::pin(self.put_body(url, body, content_type, progress))
    }
}

/// Splits `body` into zero-copy slices.
fn slices(body: &Bytes, size: usize) -> Vec<Bytes> {
    let size = size.max(1);
    (0..body.len())
        .step_by(size)
        .map(|start| body.slice(start..(start + size).min(body.len())))
        .collect()
}

/// Body stream that reports `(sent, total)` as each slice is handed to
/// the connection.
fn progress_stream(
    body: Bytes,
    size: usize,
    progress: ByteProgress,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = body.len() as u64;
    let mut sent = 0u64;
    stream::iter(slices(&body, size)).map(move |slice| {
        sent += slice.len() as u64;
        progress(sent, total);
        Ok(slice)
    })
}
