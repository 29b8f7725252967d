//! Control-plane client.

use std::time::Duration;

use clipdrop_protocol::{
    ChunkUrlRequest, ChunkUrlResponse, CompleteMultipartRequest, CompletedPartEntry,
    InitUploadRequest, InitUploadResponse, StatusMessage,
};
use clipdrop_transfer::{CompletedPart, UploadSession, UploadTarget};
use clipdrop_uploader::{BoxFuture, ControlPlane, ControlPlaneError};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Control-plane reached over HTTP/JSON.
pub struct HttpControlPlane {
    http: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    /// Creates a client for the API at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ControlPlaneError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ControlPlaneError::Http(e.to_string()))?;
        Ok(Self::with_client(http, base_url))
    }

    /// Uses an existing `reqwest` client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn videos_url(&self, owner_id: &str) -> String {
        format!(
            "{}/api/events/{}/videos",
            self.base_url,
            utf8_percent_encode(owner_id, NON_ALPHANUMERIC)
        )
    }

    fn video_url(&self, target: &UploadTarget, session: &UploadSession, path: &str) -> String {
        format!(
            "{}/{}/{path}",
            self.videos_url(&target.owner_id),
            utf8_percent_encode(&session.object_id, NON_ALPHANUMERIC)
        )
    }

    /// POSTs `body` as JSON and returns the raw response body.
    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<Vec<u8>, ControlPlaneError> {
        let mut req = self.http.post(url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ControlPlaneError::Http(e.to_string()))?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ControlPlaneError::Http(e.to_string()))
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, ControlPlaneError> {
        let bytes = self.post(url, Some(body), &[]).await?;
        serde_json::from_slice(&bytes).map_err(|e| ControlPlaneError::InvalidResponse(e.to_string()))
    }

    async fn open(&self, target: &UploadTarget) -> Result<UploadSession, ControlPlaneError> {
        let req = InitUploadRequest {
            filename: target.file_name.clone(),
            content_type: target.content_type.clone(),
            file_size: target.file_size,
            angle_type: target.angle,
        };
        let url = format!("{}/multipart/init", self.videos_url(&target.owner_id));
        let resp: InitUploadResponse = self.post_json(&url, &req).await?;
        debug!(
            file = %target.file_name,
            video_id = %resp.video_id,
            multipart = resp.use_multipart,
            chunks = resp.total_chunks,
            "init response"
        );
        Ok(session_from_init(resp))
    }

    async fn mint(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        part_number: u32,
    ) -> Result<String, ControlPlaneError> {
        let req = ChunkUrlRequest {
            upload_id: session_id(session)?.to_string(),
            chunk_number: part_number,
        };
        let url = self.video_url(target, session, "multipart/chunk-url");
        let resp: ChunkUrlResponse = self.post_json(&url, &req).await?;
        if resp.chunk_number != part_number {
            return Err(ControlPlaneError::InvalidResponse(format!(
                "asked for part {part_number}, got URL for part {}",
                resp.chunk_number
            )));
        }
        if resp.upload_url.is_empty() {
            return Err(ControlPlaneError::InvalidResponse(format!(
                "empty upload URL for part {part_number}"
            )));
        }
        Ok(resp.upload_url)
    }

    async fn complete(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<(), ControlPlaneError> {
        let req = CompleteMultipartRequest {
            upload_id: session_id(session)?.to_string(),
            parts: parts.iter().cloned().map(CompletedPartEntry::from).collect(),
        };
        let url = self.video_url(target, session, "multipart/complete");
        let body = self.post(&url, Some(&req), &[]).await?;
        log_ack("complete", &body);
        Ok(())
    }

    async fn uploaded(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
    ) -> Result<(), ControlPlaneError> {
        let url = self.video_url(target, session, "uploaded");
        let body = self.post::<()>(&url, None, &[]).await?;
        log_ack("uploaded", &body);
        Ok(())
    }

    async fn abort(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
    ) -> Result<(), ControlPlaneError> {
        let upload_id = session_id(session)?;
        let url = self.video_url(target, session, "multipart/abort");
        let body = self
            .post::<()>(&url, None, &[("upload_id", upload_id)])
            .await?;
        log_ack("abort", &body);
        Ok(())
    }
}

impl ControlPlane for HttpControlPlane {
    fn open_session<'a>(
        &'a self,
        target: &'a UploadTarget,
    ) -> BoxFuture<'a, Result<UploadSession, ControlPlaneError>> {
        Box::pin(self.open(target))
    }

    fn mint_part_url<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
        part_number: u32,
    ) -> BoxFuture<'a, Result<String, ControlPlaneError>> {
        Box::pin(self.mint(target, session, part_number))
    }

    fn complete_session<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
        parts: &'a [CompletedPart],
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>> {
        Box::pin(self.complete(target, session, parts))
    }

    fn mark_uploaded<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>> {
        Box::pin(self.uploaded(target, session))
    }

    fn abort_session<'a>(
        &'a self,
        target: &'a UploadTarget,
        session: &'a UploadSession,
    ) -> BoxFuture<'a, Result<(), ControlPlaneError>> {
        Box::pin(self.abort(target, session))
    }
}

/// Acknowledgement bodies are informational; anything but a status
/// message is ignored.
fn log_ack(action: &str, body: &[u8]) {
    if let Ok(ack) = serde_json::from_slice::<StatusMessage>(body) {
        debug!(action, message = %ack.message, video_id = ?ack.video_id, "control-plane ack");
    }
}

/// Maps the init response onto a session descriptor.
///
/// An empty `upload_id` means no multi-part session exists.
fn session_from_init(resp: InitUploadResponse) -> UploadSession {
    let session_id = Some(resp.upload_id).filter(|id| !id.is_empty());
    UploadSession {
        object_id: resp.video_id,
        object_key: resp.s3_key,
        session_id,
        part_size: resp.chunk_size,
        total_parts: resp.total_chunks,
        multipart: resp.use_multipart,
        single_upload_url: resp.upload_url.filter(|u| !u.is_empty()),
    }
}

fn session_id(session: &UploadSession) -> Result<&str, ControlPlaneError> {
    session
        .session_id
        .as_deref()
        .ok_or_else(|| ControlPlaneError::InvalidResponse("session has no upload id".into()))
}
