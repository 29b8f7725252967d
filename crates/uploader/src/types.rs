//! Data types for the upload flow.

use std::path::PathBuf;
use std::time::Duration;

use clipdrop_transfer::{
    AngleType, CompletedPart, DEFAULT_CONTENT_TYPE, RetryPolicy, TransferError, UploadPhase,
    UploadProgress, UploadTarget,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::DEFAULT_CONCURRENCY;
use crate::error::FailurePhase;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderConfig {
    /// Parts in flight per file.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// One file to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub target: UploadTarget,
}

impl UploadRequest {
    /// Builds a request from a file on disk.
    ///
    /// An empty `content_type` falls back to [`DEFAULT_CONTENT_TYPE`].
    pub fn from_path(
        owner_id: &str,
        path: impl Into<PathBuf>,
        content_type: &str,
        angle: AngleType,
    ) -> Result<Self, TransferError> {
        let path = path.into();
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        let target = UploadTarget::from_path(owner_id, &path, content_type, angle)?;
        Ok(Self { path, target })
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub object_id: String,
    pub object_key: String,
    pub multipart: bool,
    /// Submitted parts, sorted; empty for single-shot uploads.
    pub parts: Vec<CompletedPart>,
    pub bytes: u64,
}

/// Per-file result of a batch.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub file_name: String,
    pub success: bool,
    pub object_id: Option<String>,
    pub error: Option<String>,
    pub failed_phase: Option<FailurePhase>,
}

/// Event emitted while uploading.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Overall progress for a file.
    Progress {
        file: String,
        phase: UploadPhase,
        percent: u8,
    },
    /// A part attempt failed and will be retried after `delay`.
    PartRetrying {
        file: String,
        part_number: Option<u32>,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// A part finished.
    PartCompleted { file: String, part_number: u32 },
    /// The object is finalized.
    Completed { file: String, object_id: String },
    /// The upload failed.
    Failed {
        file: String,
        phase: FailurePhase,
        error: String,
    },
}

/// Event emitter bound to one file.
///
/// Progress, retry and part events are dropped when the channel is full;
/// they never slow the transfer down. The terminal `Completed`/`Failed`
/// events wait for room in the channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<UploadEvent>>,
    file: String,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<UploadEvent>, file: impl Into<String>) -> Self {
        Self {
            tx: Some(tx),
            file: file.into(),
        }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            file: String::new(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn progress(&self, progress: UploadProgress) {
        self.emit(UploadEvent::Progress {
            file: self.file.clone(),
            phase: progress.phase,
            percent: progress.percent,
        });
    }

    pub fn part_retrying(
        &self,
        part_number: Option<u32>,
        attempt: u32,
        delay: Duration,
        error: &dyn std::fmt::Display,
    ) {
        self.emit(UploadEvent::PartRetrying {
            file: self.file.clone(),
            part_number,
            attempt,
            delay,
            error: error.to_string(),
        });
    }

    pub fn part_completed(&self, part_number: u32) {
        self.emit(UploadEvent::PartCompleted {
            file: self.file.clone(),
            part_number,
        });
    }

    pub async fn completed(&self, object_id: &str) {
        self.deliver(UploadEvent::Completed {
            file: self.file.clone(),
            object_id: object_id.to_string(),
        })
        .await;
    }

    pub async fn failed(&self, phase: FailurePhase, error: &dyn std::fmt::Display) {
        self.deliver(UploadEvent::Failed {
            file: self.file.clone(),
            phase,
            error: error.to_string(),
        })
        .await;
    }

    async fn deliver(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }

    fn emit(&self, event: UploadEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(e)) => trace!(event = ?e, "event channel full, dropping"),
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
