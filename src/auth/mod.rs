//! Authentication module
//!
//! Provides the credentials model and AWS Signature Version 4 request
//! signing used for every call made against the OBS endpoint.

use thiserror::Error;

pub mod credentials;
pub mod payload;
pub mod sigv4;

pub use credentials::{Credentials, CredentialsError, CredentialsProvider};
pub use payload::Payload;
pub use sigv4::{sign_headers, sign_headers_at, SigV4Signer, SignableRequest, SigningOutput, SigningParams};

/// Signing errors
#[derive(Error, Debug)]
pub enum SignError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
