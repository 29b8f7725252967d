//! Transfer model for presigned multi-part uploads.
//!
//! Everything in this crate is synchronous and I/O-light: the data model,
//! part planning, part reading, the per-part ledger, progress aggregation
//! and the retry policy. The async engine lives in `clipdrop-uploader`.

mod chunked;
mod parts;
mod progress;
mod retry;
mod types;
mod validation;

pub use clipdrop_protocol::AngleType;

pub use chunked::{PartRange, PartReader, part_range, plan_parts, total_parts};
pub use parts::PartLedger;
pub use progress::{ProgressAggregator, ProgressCallback, UploadPhase, UploadProgress};
pub use retry::RetryPolicy;
pub use types::{CompletedPart, Part, PartStatus, UploadSession, UploadTarget};
pub use validation::{validate_session, validate_target};

/// Default content type when the caller does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("file size changed: declared {declared} bytes, found {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("part {0} is outside the planned session")]
    UnknownPart(u32),

    #[error("parts not complete: {0:?}")]
    IncompleteParts(Vec<u32>),
}
