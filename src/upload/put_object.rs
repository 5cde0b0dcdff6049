//! PutObject handler
//!
//! Uploads bodies no larger than the segment size with one signed PUT.
//! No multipart session is opened.
//!
//! # Example
//!
//! ```no_run
//! use obs_uploadr::obs::{ObjectBody, ObjectHeaders, ObsClient, ObsClientConfig};
//! use obs_uploadr::upload::put_object::PutObjectHandler;
//! use obs_uploadr::config::AddressingStyle;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ObsClientConfig {
//!     bucket: "my-bucket".to_string(),
//!     region: "eu-de".to_string(),
//!     endpoint: None,
//!     addressing_style: AddressingStyle::VirtualHost,
//!     access_key: Some("access-key".to_string()),
//!     secret_key: Some("secret-key".to_string()),
//!     security_token: None,
//!     timeout: None,
//!     unsigned_payload: false,
//! };
//! let handler = PutObjectHandler::new(Arc::new(ObsClient::new(config)?));
//!
//! let body = ObjectBody::file("hello.txt", 0, 13);
//! let result = handler.upload("hello.txt", body, &ObjectHeaders::default()).await?;
//! println!("Uploaded with ETag: {}", result.etag);
//! # Ok(())
//! # }
//! ```

use super::{ObjectStore, UploadError, UploadMethod, UploadResult};
use crate::metrics;
use crate::obs::{ObjectBody, ObjectHeaders};
use std::sync::Arc;
use std::time::Instant;

/// Single-request upload handler
pub struct PutObjectHandler {
    store: Arc<dyn ObjectStore>,
}

impl PutObjectHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload `body` as `key` with a single PutObject request
    #[tracing::instrument(
        name = "upload.put_object",
        skip(self, body, headers),
        fields(
            obs.bucket = %self.store.bucket(),
            obs.key = %key,
            http.content_type = ?headers.content_type,
            upload.bytes = body.len(),
            obs.etag = tracing::field::Empty,
            upload.bytes_written = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        key: &str,
        body: ObjectBody,
        headers: &ObjectHeaders,
    ) -> Result<UploadResult, UploadError> {
        let bucket = self.store.bucket().to_string();
        let bytes_written = body.len();
        let start_time = Instant::now();

        let upload_result = self.store.put_object(key, body, headers).await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&bucket, "put_object", duration.as_secs_f64());

        match upload_result {
            Ok(etag) => {
                metrics::record_upload_success(&bucket, bytes_written);

                let result = UploadResult {
                    etag,
                    bytes_written,
                    parts: 1,
                    method: UploadMethod::Single,
                };

                let span = tracing::Span::current();
                span.record("obs.etag", result.etag.as_str());
                span.record("upload.bytes_written", bytes_written);

                tracing::info!(
                    etag = %result.etag,
                    bytes_written = bytes_written,
                    duration_ms = duration.as_millis(),
                    "PutObject upload completed"
                );

                Ok(result)
            }
            Err(e) => {
                metrics::record_upload_failure(&bucket);
                metrics::record_error("put_object");

                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "PutObject upload failed"
                );

                Err(e.into())
            }
        }
    }
}
