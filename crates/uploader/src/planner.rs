//! Session opening.

use clipdrop_transfer::{UploadSession, UploadTarget, validate_session};
use tracing::{debug, warn};

use crate::connection::ControlPlane;
use crate::error::{ControlPlaneError, UploadError};

/// Opens sessions through the control-plane.
///
/// The single-shot vs multi-part decision is taken from the response as-is;
/// no size threshold is applied locally.
pub struct SessionPlanner<'a> {
    control: &'a dyn ControlPlane,
}

impl<'a> SessionPlanner<'a> {
    pub fn new(control: &'a dyn ControlPlane) -> Self {
        Self { control }
    }

    /// Opens a session for `target`. Not retried.
    ///
    /// A descriptor that fails validation is reported as an open error; if
    /// it carried a multi-part session id, that session is aborted first.
    pub async fn open(&self, target: &UploadTarget) -> Result<UploadSession, UploadError> {
        let session = self
            .control
            .open_session(target)
            .await
            .map_err(UploadError::SessionOpen)?;

        if let Err(e) = validate_session(target, &session) {
            if session.multipart && session.session_id.is_some() {
                if let Err(abort_err) = self.control.abort_session(target, &session).await {
                    warn!(
                        file = %target.file_name,
                        error = %abort_err,
                        "failed to abort rejected session"
                    );
                }
            }
            return Err(UploadError::SessionOpen(ControlPlaneError::InvalidResponse(
                e.to_string(),
            )));
        }

        debug!(
            file = %target.file_name,
            object_id = %session.object_id,
            multipart = session.multipart,
            part_size = session.part_size,
            total_parts = session.total_parts,
            "session opened"
        );
        Ok(session)
    }
}
