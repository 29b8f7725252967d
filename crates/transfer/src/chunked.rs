use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::TransferError;

/// Byte range of one part: `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub offset: u64,
    pub length: u64,
}

impl PartRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Number of parts needed to cover `file_size` bytes: `ceil(file_size / part_size)`.
///
/// Returns 0 when `part_size` is 0.
pub fn total_parts(file_size: u64, part_size: u64) -> u32 {
    if part_size == 0 {
        return 0;
    }
    u32::try_from(file_size.div_ceil(part_size)).unwrap_or(u32::MAX)
}

/// Byte range of a 1-based `part_number`.
///
/// Pure function of its inputs. Returns `None` for part 0, a zero part
/// size, or a part number past the end of the file.
pub fn part_range(part_number: u32, part_size: u64, file_size: u64) -> Option<PartRange> {
    if part_number == 0 || part_size == 0 {
        return None;
    }
    let offset = u64::from(part_number - 1).checked_mul(part_size)?;
    if offset >= file_size {
        return None;
    }
    let length = part_size.min(file_size - offset);
    Some(PartRange { offset, length })
}

/// Every `(part_number, range)` pair of a file, in ascending order.
pub fn plan_parts(file_size: u64, part_size: u64) -> impl Iterator<Item = (u32, PartRange)> {
    (1..=total_parts(file_size, part_size))
        .filter_map(move |n| part_range(n, part_size, file_size).map(|r| (n, r)))
}

// ---------------------------------------------------------------------------
// PartReader
// ---------------------------------------------------------------------------

/// Reads byte ranges of a local file.
///
/// Each read opens its own handle, so one reader can be shared by
/// concurrent part transfers.
#[derive(Debug, Clone)]
pub struct PartReader {
    path: PathBuf,
    file_size: u64,
}

impl PartReader {
    /// Opens `path` and records its current size.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file_size = std::fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file_size,
        })
    }

    /// Fails if the file no longer has the declared size.
    pub fn ensure_size(&self, declared: u64) -> Result<(), TransferError> {
        if self.file_size != declared {
            return Err(TransferError::SizeMismatch {
                declared,
                actual: self.file_size,
            });
        }
        Ok(())
    }

    /// Reads exactly `range.length` bytes starting at `range.offset`.
    pub fn read_range(&self, range: PartRange) -> Result<Vec<u8>, TransferError> {
        let mut file = std::fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(range.offset))?;
        let len = usize::try_from(range.length).map_err(|_| {
            TransferError::InvalidSession(format!("part length {} too large", range.length))
        })?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads the whole file (single-shot uploads).
    pub fn read_all(&self) -> Result<Vec<u8>, TransferError> {
        Ok(std::fs::read(&self.path)?)
    }

    /// Size of the file when it was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}
