//! OBS Uploadr Library
//!
//! SigV4-signed uploads to S3-compatible object storage (OBS), with
//! concurrent multipart segmenting for large files.
//!
//! # Features
//!
//! - **SigV4 Signing**: canonical request, HMAC key chain, per-day key cache
//! - **Streaming Bodies**: file ranges are hashed and sent in chunks
//! - **Multipart Orchestration**: bounded concurrency, one retry per
//!   segment, verified completion, abort on failure
//! - **Skip Unchanged**: optional SHA-256 metadata comparison
//!
//! # Example
//!
//! ```no_run
//! use obs_uploadr::config::Config;
//! use obs_uploadr::obs::{ObsClient, ObsClientConfig};
//! use obs_uploadr::upload::{ObjectUploader, UploadOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("obs.yaml")?;
//!     let client = ObsClient::new(ObsClientConfig::from_config(&config)?)?;
//!     let uploader = ObjectUploader::new(Arc::new(client), config.upload.clone());
//!     let result = uploader
//!         .upload_file("disk.img", "backups/disk.img", &UploadOptions::default())
//!         .await?;
//!     println!("{}", result.etag);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod obs;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use obs::ObsClient;
pub use upload::ObjectUploader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
