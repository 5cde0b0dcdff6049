//! Request body sources
//!
//! File-backed bodies are reopened and seeked for every send, so a retried
//! request always starts from the first byte of its range.

use crate::auth::payload::{hash_file_range, sha256_hex, EMPTY_PAYLOAD_SHA256, UNSIGNED_PAYLOAD};
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Read size for streamed file bodies
const STREAM_CHUNK_SIZE: usize = 256 * 1024;

/// A contiguous byte range of a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRange {
    pub path: PathBuf,
    pub offset: u64,
    pub length: u64,
}

/// Body of an outgoing request
#[derive(Debug, Clone)]
pub enum ObjectBody {
    Bytes(Bytes),
    File(FileRange),
}

impl ObjectBody {
    pub fn empty() -> Self {
        ObjectBody::Bytes(Bytes::new())
    }

    pub fn file(path: impl Into<PathBuf>, offset: u64, length: u64) -> Self {
        ObjectBody::File(FileRange {
            path: path.into(),
            offset,
            length,
        })
    }

    /// Body length in bytes
    pub fn len(&self) -> u64 {
        match self {
            ObjectBody::Bytes(bytes) => bytes.len() as u64,
            ObjectBody::File(range) => range.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for `x-amz-content-sha256`
    ///
    /// File ranges are hashed in chunks, or replaced by the unsigned
    /// sentinel when `unsigned_payload` is set.
    pub async fn content_sha256(&self, unsigned_payload: bool) -> std::io::Result<String> {
        if self.is_empty() {
            return Ok(EMPTY_PAYLOAD_SHA256.to_string());
        }
        match self {
            ObjectBody::Bytes(bytes) => Ok(sha256_hex(bytes)),
            ObjectBody::File(_) if unsigned_payload => Ok(UNSIGNED_PAYLOAD.to_string()),
            ObjectBody::File(range) => hash_file_range(&range.path, range.offset, range.length).await,
        }
    }

    /// Convert into a `reqwest` body, opening file ranges as a stream
    pub async fn into_request_body(self) -> std::io::Result<reqwest::Body> {
        match self {
            ObjectBody::Bytes(bytes) => Ok(reqwest::Body::from(bytes)),
            ObjectBody::File(range) => {
                let mut file = tokio::fs::File::open(&range.path).await?;
                file.seek(SeekFrom::Start(range.offset)).await?;
                let reader = file.take(range.length);
                Ok(reqwest::Body::wrap_stream(ReaderStream::with_capacity(
                    reader,
                    STREAM_CHUNK_SIZE,
                )))
            }
        }
    }
}

impl From<Bytes> for ObjectBody {
    fn from(bytes: Bytes) -> Self {
        ObjectBody::Bytes(bytes)
    }
}
