//! Collaborator traits: the control-plane and the object store.
//!
//! The CLI implements these over HTTP (`clipdrop-http`). Keeping them as
//! traits decouples the engine from transport and makes it testable with mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use clipdrop_transfer::{CompletedPart, UploadSession, UploadTarget};

use crate::error::{ControlPlaneError, TransportError};

/// Boxed `Send` future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte-level progress callback: `(bytes_sent, bytes_total)`.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Service that opens, signs, finalizes and aborts upload sessions.
pub trait ControlPlane: Send + Sync {
    /// Opens a session. The service alone decides single-shot vs multi-part.
    fn open_session<'a>(
        &'a self,
        target: &'a UploadTarget,
    ) -> BoxFuture<'a, Result<UploadSession, ControlPlaneError>>;

    /// Mints a fresh presigned URL for one part. Each URL is used at most once.
    fn mint_part_url<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
        part_number: u32,
    ) -> BoxFuture<'a, Result<String, ControlPlaneError>>;

    /// Stitches a multi-part session. `parts` is sorted by part number.
    fn complete_session<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
        parts: &'a [CompletedPart],
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>>;

    /// Finalizes a single-shot upload.
    fn mark_uploaded<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>>;

    /// Releases a multi-part session.
    fn abort_session<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>>;
}

/// Result of a successful PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResponse {
    pub status: u16,
    /// Completion token (the `ETag` header), verbatim.
    pub etag: Option<String>,
}

/// Object store reachable only through presigned URLs.
pub trait ObjectStore: Send + Sync {
    /// PUTs `body` to `url`, reporting progress as bytes are streamed.
    ///
    /// Non-2xx responses are returned as [`TransportError::Status`].
    fn put<'a>(
        &'a self,
        url: &'a str,
        body: Bytes,
        content_type: &'a str,
        progress: ByteProgress,
    ) -> BoxFuture<'a, Result<PutResponse, TransportError>>;
}
