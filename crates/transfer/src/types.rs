use std::ops::RangeInclusive;
use std::path::Path;

use clipdrop_protocol::{AngleType, CompletedPartEntry};
use serde::{Deserialize, Serialize};

use crate::TransferError;
use crate::chunked::{PartRange, part_range};

/// What is being uploaded, and for whom. Built once per upload call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Logical owner (the event the video belongs to).
    pub owner_id: String,
    pub file_name: String,
    /// Declared size in bytes.
    pub file_size: u64,
    pub content_type: String,
    pub angle: AngleType,
}

impl UploadTarget {
    pub fn new(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        content_type: impl Into<String>,
        angle: AngleType,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            file_name: file_name.into(),
            file_size,
            content_type: content_type.into(),
            angle,
        }
    }

    /// Builds a target from a file on disk, taking name and size from its metadata.
    pub fn from_path(
        owner_id: impl Into<String>,
        path: &Path,
        content_type: impl Into<String>,
        angle: AngleType,
    ) -> Result<Self, TransferError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidTarget(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TransferError::InvalidTarget(format!("no file name in {}", path.display()))
            })?;
        Ok(Self::new(
            owner_id,
            file_name,
            metadata.len(),
            content_type,
            angle,
        ))
    }
}

/// Server-assigned identity of one transfer attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Opaque object id (the video id).
    pub object_id: String,
    /// Object key inside the bucket, informational only.
    pub object_key: String,
    /// Multi-part session id; `None` for single-shot uploads.
    pub session_id: Option<String>,
    pub part_size: u64,
    pub total_parts: u32,
    pub multipart: bool,
    /// Presigned URL for single-shot uploads.
    pub single_upload_url: Option<String>,
}

impl UploadSession {
    /// Byte range of `part_number` for a file of `file_size` bytes.
    pub fn part_range(&self, part_number: u32, file_size: u64) -> Option<PartRange> {
        if !self.multipart || part_number > self.total_parts {
            return None;
        }
        part_range(part_number, self.part_size, file_size)
    }

    /// All part numbers of this session, 1-based.
    pub fn part_numbers(&self) -> RangeInclusive<u32> {
        1..=self.total_parts
    }
}

/// Transient state of one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    Pending,
    InFlight,
    Complete,
    Failed,
}

/// One contiguous slice of the source file. The byte range is derived
/// from the part number and is not stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub number: u32,
    pub status: PartStatus,
    pub attempts: u32,
    pub token: Option<String>,
}

impl Part {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            status: PartStatus::Pending,
            attempts: 0,
            token: None,
        }
    }
}

/// A finished part, ready to be submitted at finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub token: String,
}

impl From<CompletedPart> for CompletedPartEntry {
    fn from(part: CompletedPart) -> Self {
        CompletedPartEntry {
            part_number: part.part_number,
            etag: part.token,
        }
    }
}
