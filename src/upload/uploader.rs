//! File uploader
//!
//! Entry point for uploading one local file. Files up to the segment size
//! go through [`PutObjectHandler`]; larger files through
//! [`MultipartHandler`].
//!
//! With `checksum_metadata` enabled the file's SHA-256 is stored as the
//! `x-amz-meta-sdk-sha256` header. With `skip_unchanged` also enabled, an
//! object whose stored checksum and size match the local file is left
//! untouched.

use super::multipart::MultipartHandler;
use super::put_object::PutObjectHandler;
use super::segment::{effective_segment_size, needs_multipart};
use super::{ObjectStore, UploadError, UploadMethod, UploadResult};
use crate::auth::payload::hash_file_range;
use crate::config::UploadConfig;
use crate::metrics;
use crate::obs::{ObjectBody, ObjectHeaders};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Metadata name holding the file SHA-256
pub const CHECKSUM_METADATA_KEY: &str = "sdk-sha256";

/// Per-upload options
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    /// User metadata, sent as `x-amz-meta-<name>`
    pub metadata: BTreeMap<String, String>,
}

/// Uploads local files, choosing single or multipart by size
pub struct ObjectUploader {
    store: Arc<dyn ObjectStore>,
    settings: UploadConfig,
    put_object: PutObjectHandler,
    multipart: MultipartHandler,
}

impl ObjectUploader {
    pub fn new(store: Arc<dyn ObjectStore>, settings: UploadConfig) -> Self {
        let segment_size = effective_segment_size(settings.segment_size, settings.max_file_size);
        if segment_size != settings.segment_size {
            tracing::warn!(
                requested = settings.segment_size,
                effective = segment_size,
                "Segment size clamped"
            );
        }

        Self {
            put_object: PutObjectHandler::new(store.clone()),
            multipart: MultipartHandler::new(store.clone(), segment_size, settings.concurrent_segments),
            store,
            settings,
        }
    }

    /// Effective segment size after clamping
    pub fn segment_size(&self) -> u64 {
        self.multipart.segment_size()
    }

    /// Upload the file at `path` as `key`
    #[tracing::instrument(
        name = "upload.file",
        skip(self, path, options),
        fields(obs.bucket = %self.store.bucket(), obs.key = %key, file.path = %path.as_ref().display()),
        err
    )]
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        options: &UploadOptions,
    ) -> Result<UploadResult, UploadError> {
        let path = path.as_ref();
        let file_metadata = tokio::fs::metadata(path).await?;
        if !file_metadata.is_file() {
            return Err(UploadError::Configuration(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }
        let file_size = file_metadata.len();

        let mut headers = ObjectHeaders {
            content_type: options.content_type.clone(),
            metadata: options.metadata.clone(),
        };

        if self.settings.checksum_metadata {
            let checksum = hash_file_range(path, 0, file_size).await?;

            if self.settings.skip_unchanged {
                if let Some(result) = self.check_unchanged(key, file_size, &checksum).await? {
                    return Ok(result);
                }
            }
            headers
                .metadata
                .insert(CHECKSUM_METADATA_KEY.to_string(), checksum);
        }

        if needs_multipart(file_size, self.segment_size()) {
            tracing::debug!(file_size, segment_size = self.segment_size(), "Using multipart upload");
            self.multipart.upload(path, file_size, key, &headers).await
        } else {
            let body = ObjectBody::file(path, 0, file_size);
            self.put_object.upload(key, body, &headers).await
        }
    }

    /// `Some(Skipped)` if the remote object already has this checksum and size
    async fn check_unchanged(
        &self,
        key: &str,
        file_size: u64,
        checksum: &str,
    ) -> Result<Option<UploadResult>, UploadError> {
        let Some(remote) = self.store.head_object(key).await? else {
            return Ok(None);
        };

        let same_checksum = remote
            .metadata
            .get(CHECKSUM_METADATA_KEY)
            .is_some_and(|remote_checksum| remote_checksum == checksum);
        let same_size = remote.content_length == Some(file_size);
        if !(same_checksum && same_size) {
            return Ok(None);
        }

        metrics::record_upload_skipped(self.store.bucket());
        tracing::info!(key = %key, "Remote object unchanged, skipping upload");

        Ok(Some(UploadResult {
            etag: remote.etag.unwrap_or_default(),
            bytes_written: 0,
            parts: 0,
            method: UploadMethod::Skipped,
        }))
    }
}
