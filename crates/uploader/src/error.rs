//! Upload error types.

use std::time::Duration;

use clipdrop_transfer::TransferError;

/// Errors returned by a [`ControlPlane`](crate::ControlPlane) call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("control-plane returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Why a single part attempt failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("object store returned status {0}")]
    Status(u16),

    #[error("response carried no completion token")]
    MissingToken,

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("no upload URL: {0}")]
    UrlUnavailable(ControlPlaneError),
}

/// The phase an upload failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Open,
    Transfer,
    Finalize,
    Cancelled,
}

impl FailurePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePhase::Open => "open",
            FailurePhase::Transfer => "transfer",
            FailurePhase::Finalize => "finalize",
            FailurePhase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of one upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("could not open upload session: {0}")]
    SessionOpen(#[source] ControlPlaneError),

    #[error("{} failed after {attempts} attempt(s): {last_cause}", part_label(*part_number))]
    PartTransfer {
        /// `None` for a single-shot upload.
        part_number: Option<u32>,
        attempts: u32,
        #[source]
        last_cause: TransportError,
    },

    /// The finalize call failed after every part succeeded. The remote
    /// session may already be stitched or left orphaned.
    #[error("finalize failed, remote state unknown: {0}")]
    Finalize(#[source] ControlPlaneError),

    #[error("cancelled")]
    Cancelled,

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("task join error: {0}")]
    Join(String),
}

impl UploadError {
    /// Classifies the error by the phase that produced it.
    pub fn phase(&self) -> FailurePhase {
        match self {
            UploadError::SessionOpen(_) => FailurePhase::Open,
            UploadError::Transfer(
                TransferError::InvalidTarget(_) | TransferError::InvalidSession(_),
            ) => FailurePhase::Open,
            UploadError::PartTransfer { .. }
            | UploadError::Transfer(_)
            | UploadError::Join(_) => FailurePhase::Transfer,
            UploadError::Finalize(_) => FailurePhase::Finalize,
            UploadError::Cancelled => FailurePhase::Cancelled,
        }
    }

    /// Failing part number, for transfer failures of a multi-part upload.
    pub fn part_number(&self) -> Option<u32> {
        match self {
            UploadError::PartTransfer { part_number, .. } => *part_number,
            _ => None,
        }
    }
}

fn part_label(part_number: Option<u32>) -> String {
    match part_number {
        Some(n) => format!("part {n}"),
        None => "single-shot upload".into(),
    }
}
