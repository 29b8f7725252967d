use serde::{Deserialize, Serialize};

use crate::types::AngleType;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens an upload session (single-shot or multi-part, decided by the server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub content_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub angle_type: AngleType,
}

/// Requests a fresh presigned URL for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkUrlRequest {
    pub upload_id: String,
    pub chunk_number: u32,
}

/// One completed part, in the shape the object store expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPartEntry {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Stitches a multi-part session. `parts` must be sorted by part number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteMultipartRequest {
    pub upload_id: String,
    pub parts: Vec<CompletedPartEntry>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Session descriptor returned by the init endpoint.
///
/// `upload_id` is empty and `upload_url` is set for single-shot uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub video_id: String,
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub s3_key: String,
    #[serde(default)]
    pub chunk_size: u64,
    #[serde(default)]
    pub total_chunks: u32,
    pub use_multipart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

/// Presigned URL for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkUrlResponse {
    pub chunk_number: u32,
    pub upload_url: String,
}

/// Generic acknowledgement body (`{"message": ..., "video_id": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}
