//! Upload module
//!
//! Single-request and multipart uploads of local files to OBS.
//!
//! The orchestration code talks to storage through the [`ObjectStore`]
//! trait; [`ObsClient`] is the production implementation.

use crate::obs::{CompletedPart, ObjectBody, ObjectHeaders, ObjectMetadata, ObsClient, ObsClientError};
use async_trait::async_trait;
use thiserror::Error;

pub mod multipart;
pub mod put_object;
pub mod segment;
pub mod uploader;

pub use multipart::{MultipartHandler, UploadSession, UploadState};
pub use put_object::PutObjectHandler;
pub use uploader::{ObjectUploader, UploadOptions};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// Missing or invalid credentials or settings; never retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single request failed and may succeed if sent again
    #[error("Transient request error: {0}")]
    Transient(#[source] ObsClientError),

    /// Retries are exhausted; the multipart session has been aborted
    #[error("Upload {upload_id} failed: {reason}")]
    Fatal {
        upload_id: String,
        reason: String,
        #[source]
        source: Option<ObsClientError>,
    },

    /// Best-effort abort failed; logged, never returned over a `Fatal`
    #[error("Cleanup of upload {upload_id} failed: {source}")]
    Cleanup {
        upload_id: String,
        #[source]
        source: ObsClientError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ObsClientError> for UploadError {
    fn from(err: ObsClientError) -> Self {
        match err {
            ObsClientError::ConfigError(_) | ObsClientError::SigningError(_) => {
                UploadError::Configuration(err.to_string())
            }
            other => UploadError::Transient(other),
        }
    }
}

/// How an object reached the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMethod {
    /// One PutObject request
    Single,
    /// Multipart session
    Multipart,
    /// Remote object already matched the local checksum
    Skipped,
}

/// Upload result
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub etag: String,
    pub bytes_written: u64,
    pub parts: usize,
    pub method: UploadMethod,
}

/// Storage operations the upload handlers rely on
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket objects are written to
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        headers: &ObjectHeaders,
    ) -> Result<String, ObsClientError>;

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMetadata>, ObsClientError>;

    async fn initiate_multipart_upload(
        &self,
        key: &str,
        headers: &ObjectHeaders,
    ) -> Result<String, ObsClientError>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ObjectBody,
    ) -> Result<String, ObsClientError>;

    async fn list_parts(&self, key: &str, upload_id: &str) -> Result<Vec<CompletedPart>, ObsClientError>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<String, ObsClientError>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), ObsClientError>;
}

#[async_trait]
impl ObjectStore for ObsClient {
    fn bucket(&self) -> &str {
        ObsClient::bucket(self)
    }

    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        headers: &ObjectHeaders,
    ) -> Result<String, ObsClientError> {
        ObsClient::put_object(self, key, body, headers)
            .await
            .map(|response| response.etag)
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMetadata>, ObsClientError> {
        ObsClient::head_object(self, key).await
    }

    async fn initiate_multipart_upload(
        &self,
        key: &str,
        headers: &ObjectHeaders,
    ) -> Result<String, ObsClientError> {
        ObsClient::initiate_multipart_upload(self, key, headers).await
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: ObjectBody,
    ) -> Result<String, ObsClientError> {
        ObsClient::upload_part(self, key, upload_id, part_number, body).await
    }

    async fn list_parts(&self, key: &str, upload_id: &str) -> Result<Vec<CompletedPart>, ObsClientError> {
        ObsClient::list_parts(self, key, upload_id).await
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<String, ObsClientError> {
        ObsClient::complete_multipart_upload(self, key, upload_id, parts)
            .await
            .map(|response| response.etag)
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), ObsClientError> {
        ObsClient::abort_multipart_upload(self, key, upload_id).await
    }
}
