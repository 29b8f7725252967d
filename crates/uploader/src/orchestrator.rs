//! Upload orchestrator for one or more files.
//!
//! Runs a [`SessionController`] per file, forwards progress events and
//! supports cancellation.

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::connection::{ControlPlane, ObjectStore};
use crate::controller::SessionController;
use crate::error::UploadError;
use crate::types::{EventSink, UploadEvent, UploadOutcome, UploadReport, UploadRequest, UploaderConfig};

/// Orchestrates uploads against one control-plane and object store.
pub struct UploadOrchestrator {
    config: UploaderConfig,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl Default for UploadOrchestrator {
    fn default() -> Self {
        Self::new(UploaderConfig::default())
    }
}

impl UploadOrchestrator {
    pub fn new(config: UploaderConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that cancels every upload of this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads one file.
    ///
    /// Events are only emitted once the receiver has been taken.
    pub async fn upload(
        &self,
        control: &dyn ControlPlane,
        store: &dyn ObjectStore,
        request: &UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        let target = &request.target;
        let events = if self.events_rx.is_some() {
            EventSink::disabled()
        } else {
            EventSink::new(self.events_tx.clone(), target.file_name.clone())
        };

        info!(
            file = %target.file_name,
            owner = %target.owner_id,
            bytes = target.file_size,
            angle = %target.angle,
            "upload started"
        );

        let controller = SessionController::new(control, store, &self.config)
            .with_cancel(self.cancel.child_token())
            .with_events(events.clone());

        match controller.upload(&request.path, target).await {
            Ok(outcome) => {
                events.completed(&outcome.object_id).await;
                info!(
                    file = %target.file_name,
                    object_id = %outcome.object_id,
                    parts = outcome.parts.len(),
                    "upload completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                events.failed(e.phase(), &e).await;
                error!(
                    file = %target.file_name,
                    phase = ?e.phase(),
                    error = %e,
                    "upload failed"
                );
                Err(e)
            }
        }
    }

    /// Uploads several files concurrently.
    ///
    /// Each file runs independently. If one fails, the others continue.
    /// Returns a report per request, in request order.
    pub async fn upload_batch(
        &self,
        control: &dyn ControlPlane,
        store: &dyn ObjectStore,
        requests: &[UploadRequest],
    ) -> Vec<UploadReport> {
        join_all(requests.iter().map(|request| async move {
            let file_name = request.target.file_name.clone();
            match self.upload(control, store, request).await {
                Ok(outcome) => UploadReport {
                    file_name,
                    success: true,
                    object_id: Some(outcome.object_id),
                    error: None,
                    failed_phase: None,
                },
                Err(e) => UploadReport {
                    file_name,
                    success: false,
                    object_id: None,
                    error: Some(e.to_string()),
                    failed_phase: Some(e.phase()),
                },
            }
        }))
        .await
    }
}
