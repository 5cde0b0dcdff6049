//! Payload hashing for `x-amz-content-sha256`
//!
//! Streamed sources are hashed in fixed-size chunks so memory use stays
//! flat regardless of the body size.

use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

/// SHA-256 of the empty string
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Sentinel sent instead of a digest when the body is not hashed
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Read size used when hashing streamed bodies
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Body description handed to the signer
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// No body (GET, DELETE, HEAD, `?uploads` initiate)
    Empty,
    /// In-memory body, hashed on the spot
    Bytes(&'a [u8]),
    /// Hex digest computed ahead of time (streamed bodies)
    Precomputed(&'a str),
    /// Body is not covered by the signature
    Unsigned,
}

impl Payload<'_> {
    /// Value for `x-amz-content-sha256`
    pub fn content_sha256(&self) -> String {
        match self {
            Payload::Empty => EMPTY_PAYLOAD_SHA256.to_string(),
            Payload::Bytes(bytes) if bytes.is_empty() => EMPTY_PAYLOAD_SHA256.to_string(),
            Payload::Bytes(bytes) => sha256_hex(bytes),
            Payload::Precomputed(hash) => hash.to_string(),
            Payload::Unsigned => UNSIGNED_PAYLOAD.to_string(),
        }
    }
}

/// Hex-encoded SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash everything `reader` yields, `HASH_CHUNK_SIZE` bytes at a time
pub async fn hash_reader<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    if total == 0 {
        return Ok(EMPTY_PAYLOAD_SHA256.to_string());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash `length` bytes of the file at `path` starting at `offset`
///
/// Fails with `UnexpectedEof` if the file is shorter than the range.
pub async fn hash_file_range(path: &Path, offset: u64, length: u64) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut range = file.take(length);
    let hash = hash_reader(&mut range).await?;

    if range.limit() != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "{} ended before byte {}",
                path.display(),
                offset + length
            ),
        ));
    }
    Ok(hash)
}
