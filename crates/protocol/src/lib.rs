//! Wire types for the upload control-plane.
//!
//! The control-plane issues presigned URLs and tracks multi-part sessions.
//! Field names follow its JSON API, which is snake_case except for the
//! completed-part entries (`PartNumber`/`ETag`) forwarded to the object store.

pub mod messages;
pub mod types;

pub use messages::{
    ChunkUrlRequest, ChunkUrlResponse, CompleteMultipartRequest, CompletedPartEntry,
    InitUploadRequest, InitUploadResponse, StatusMessage,
};
pub use types::{AngleType, ProtocolError};
