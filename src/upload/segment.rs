//! Segment planning
//!
//! Splits a file into fixed-size, contiguous byte ranges. Part numbers
//! start at 1 and follow file order.

use super::UploadError;

/// Default segment size (1 GiB)
pub const DEFAULT_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Ceiling a segment is clamped to, derived from the 5 GiB single-request limit
pub const DEFAULT_MAX_FILE_SIZE: u64 = (5 * 1024 * 1024 * 1024 + 2) / 2;

/// Maximum parts allowed in one multipart upload
pub const MAX_PARTS: u64 = 10000;

/// Upload state of a single segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Pending,
    Uploaded,
    Failed,
}

/// One part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub part_number: u32,
    pub offset: u64,
    pub length: u64,
    pub state: SegmentState,
}

impl Segment {
    /// Offset one past the last byte
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Clamp the requested segment size into `1..=max_file_size`
pub fn effective_segment_size(requested: u64, max_file_size: u64) -> u64 {
    requested.clamp(1, max_file_size.max(1))
}

/// Whether a file of `file_size` bytes needs a multipart session
pub fn needs_multipart(file_size: u64, segment_size: u64) -> bool {
    file_size > segment_size
}

/// Plan the segments of a file
///
/// A file no larger than `segment_size` yields exactly one segment.
pub fn plan_segments(file_size: u64, segment_size: u64) -> Result<Vec<Segment>, UploadError> {
    if segment_size == 0 {
        return Err(UploadError::Configuration(
            "segment size must be greater than 0".into(),
        ));
    }

    let count = file_size.div_ceil(segment_size).max(1);
    if count > MAX_PARTS {
        return Err(UploadError::Configuration(format!(
            "file of {} bytes needs {} segments of {} bytes, more than the {} part limit",
            file_size, count, segment_size, MAX_PARTS
        )));
    }

    let segments = (0..count)
        .map(|index| {
            let offset = index * segment_size;
            Segment {
                part_number: index as u32 + 1,
                offset,
                length: segment_size.min(file_size - offset),
                state: SegmentState::Pending,
            }
        })
        .collect();

    Ok(segments)
}
