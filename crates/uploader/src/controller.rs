//! Per-file upload session: open, transfer, finalize or abort.

use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use clipdrop_transfer::{
    CompletedPart, PartLedger, PartReader, PartStatus, ProgressAggregator, TransferError, UploadPhase,
    UploadProgress, UploadSession, UploadTarget, validate_target,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{ByteProgress, ControlPlane, ObjectStore};
use crate::error::{ControlPlaneError, UploadError};
use crate::part::PartTransferor;
use crate::planner::SessionPlanner;
use crate::scheduler::ConcurrencyScheduler;
use crate::types::{EventSink, UploadOutcome, UploaderConfig};

/// Lifecycle of one upload.
///
/// `Idle -> Opened -> Transferring -> Finalizing -> Complete`, with
/// `Transferring -> Aborting -> Failed` when a multi-part transfer fails and
/// a direct move to `Failed` when open or finalize fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opened,
    Transferring,
    Finalizing,
    Complete,
    Aborting,
    Failed,
}

/// Drives a single file through its upload session.
///
/// One controller handles one upload; create a new one per file.
pub struct SessionController<'a> {
    control: &'a dyn ControlPlane,
    store: &'a dyn ObjectStore,
    config: &'a UploaderConfig,
    cancel: CancellationToken,
    events: EventSink,
    history: Mutex<Vec<SessionState>>,
}

impl<'a> SessionController<'a> {
    pub fn new(
        control: &'a dyn ControlPlane,
        store: &'a dyn ObjectStore,
        config: &'a UploaderConfig,
    ) -> Self {
        Self {
            control,
            store,
            config,
            cancel: CancellationToken::new(),
            events: EventSink::disabled(),
            history: Mutex::new(vec![SessionState::Idle]),
        }
    }

    /// Uses `cancel` to stop the upload from outside.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.history
            .lock()
            .unwrap()
            .last()
            .copied()
            .unwrap_or(SessionState::Idle)
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> Vec<SessionState> {
        self.history.lock().unwrap().clone()
    }

    /// Uploads the file at `path` as `target`.
    ///
    /// Progress runs from 0 to 100 through the preparing, uploading and
    /// finalizing bands. On an unrecoverable transfer failure or
    /// cancellation the multi-part session is aborted before the error is
    /// returned; abort failures are logged only.
    pub async fn upload(
        &self,
        path: &Path,
        target: &UploadTarget,
    ) -> Result<UploadOutcome, UploadError> {
        self.events.progress(UploadProgress {
            phase: UploadPhase::Preparing,
            percent: 0,
        });

        let (reader, session) = match self.open(path, target).await {
            Ok(opened) => opened,
            Err(e) => {
                self.set_state(SessionState::Failed);
                return Err(e);
            }
        };
        self.set_state(SessionState::Opened);

        let progress = Arc::new(self.aggregator(&session));

        if let Err(e) = self.check_cancelled() {
            self.abort(target, &session).await;
            self.set_state(SessionState::Failed);
            return Err(e);
        }

        self.set_state(SessionState::Transferring);
        progress.enter_phase(UploadPhase::Uploading);

        let transferred = if session.multipart {
            let ledger = PartLedger::new(session.total_parts);
            match self
                .transfer_parts(target, &session, &reader, &ledger, &progress)
                .await
            {
                Ok(()) => {
                    debug_assert!(ledger.is_complete());
                    ledger.completed_parts().map_err(UploadError::from)
                }
                Err(e) => {
                    debug!(
                        file = %target.file_name,
                        completed = ledger.count(PartStatus::Complete),
                        total = ledger.len(),
                        "part transfer stopped"
                    );
                    Err(e)
                }
            }
        } else {
            self.transfer_single(target, &session, &reader, &progress)
                .await
                .map(|()| Vec::new())
        };

        let parts = match transferred {
            Ok(parts) => parts,
            Err(e) => {
                self.abort(target, &session).await;
                self.set_state(SessionState::Failed);
                return Err(e);
            }
        };

        self.set_state(SessionState::Finalizing);
        progress.enter_phase(UploadPhase::Finalizing);

        if let Err(e) = self.finalize(target, &session, &parts).await {
            error!(
                file = %target.file_name,
                object_id = %session.object_id,
                error = %e,
                "finalize failed, remote state unknown"
            );
            self.set_state(SessionState::Failed);
            return Err(UploadError::Finalize(e));
        }

        progress.enter_phase(UploadPhase::Complete);
        self.set_state(SessionState::Complete);

        Ok(UploadOutcome {
            object_id: session.object_id,
            object_key: session.object_key,
            multipart: session.multipart,
            parts,
            bytes: target.file_size,
        })
    }

    /// Validates the target, checks the file on disk and opens the session.
    async fn open(
        &self,
        path: &Path,
        target: &UploadTarget,
    ) -> Result<(PartReader, UploadSession), UploadError> {
        validate_target(target)?;
        // Nothing remote exists yet, so no cleanup is needed.
        self.check_cancelled()?;

        let reader = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || PartReader::open(&path)
        })
        .await
        .map_err(|e| UploadError::Join(e.to_string()))??;
        reader.ensure_size(target.file_size)?;

        SessionPlanner::new(self.control).open(target).await.map(|session| (reader, session))
    }

    async fn transfer_parts(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        reader: &PartReader,
        ledger: &PartLedger,
        progress: &Arc<ProgressAggregator>,
    ) -> Result<(), UploadError> {
        let transferor = PartTransferor::new(
            self.control,
            self.store,
            &self.config.retry,
            self.events.clone(),
        );
        let scheduler = ConcurrencyScheduler::new(self.config.concurrency);

        debug!(
            file = %target.file_name,
            parts = session.total_parts,
            concurrency = scheduler.concurrency(),
            "transferring parts"
        );

        scheduler
            .run(session.part_numbers(), &self.cancel, |part_number, stop| {
                let transferor = &transferor;
                async move {
                    let range = session
                        .part_range(part_number, target.file_size)
                        .ok_or(TransferError::UnknownPart(part_number))?;
                    let data = tokio::task::spawn_blocking({
                        let reader = reader.clone();
                        move || reader.read_range(range)
                    })
                    .await
                    .map_err(|e| UploadError::Join(e.to_string()))??;

                    let on_progress: ByteProgress = {
                        let progress = Arc::clone(progress);
                        Arc::new(move |sent, total| progress.update_part(part_number, sent, total))
                    };
                    transferor
                        .transfer_part(
                            target,
                            session,
                            part_number,
                            Bytes::from(data),
                            on_progress,
                            ledger,
                            &stop,
                        )
                        .await?;

                    progress.complete_part(part_number);
                    self.events.part_completed(part_number);
                    Ok::<(), UploadError>(())
                }
            })
            .await
    }

    async fn transfer_single(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        reader: &PartReader,
        progress: &Arc<ProgressAggregator>,
    ) -> Result<(), UploadError> {
        let url = session.single_upload_url.as_deref().ok_or_else(|| {
            TransferError::InvalidSession("single-shot session without upload URL".into())
        })?;

        let data = tokio::task::spawn_blocking({
            let reader = reader.clone();
            move || reader.read_all()
        })
        .await
        .map_err(|e| UploadError::Join(e.to_string()))??;

        let on_progress: ByteProgress = {
            let progress = Arc::clone(progress);
            Arc::new(move |sent, total| progress.update_part(1, sent, total))
        };

        debug!(file = %target.file_name, bytes = data.len(), "single-shot transfer");
        PartTransferor::new(
            self.control,
            self.store,
            &self.config.retry,
            self.events.clone(),
        )
        .transfer_whole(
            url,
            Bytes::from(data),
            &target.content_type,
            on_progress,
            &self.cancel,
        )
        .await?;

        progress.complete_part(1);
        Ok(())
    }

    async fn finalize(
        &self,
        target: &UploadTarget,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<(), ControlPlaneError> {
        if session.multipart {
            self.control.complete_session(target, session, parts).await
        } else {
            self.control.mark_uploaded(target, session).await
        }
    }

    /// Best-effort release of a multi-part session.
    async fn abort(&self, target: &UploadTarget, session: &UploadSession) {
        if !session.multipart {
            return;
        }
        self.set_state(SessionState::Aborting);
        match self.control.abort_session(target, session).await {
            Ok(()) => info!(
                file = %target.file_name,
                object_id = %session.object_id,
                "multi-part session aborted"
            ),
            Err(e) => warn!(
                file = %target.file_name,
                object_id = %session.object_id,
                error = %e,
                "abort failed"
            ),
        }
    }

    fn aggregator(&self, session: &UploadSession) -> ProgressAggregator {
        let aggregator = if session.multipart {
            ProgressAggregator::new(session.total_parts)
        } else {
            ProgressAggregator::single_shot()
        };
        let events = self.events.clone();
        aggregator.with_callback(Box::new(move |p| events.progress(p)))
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SessionState) {
        debug!(file = %self.events.file(), ?state, "session state");
        self.history.lock().unwrap().push(state);
    }
}
