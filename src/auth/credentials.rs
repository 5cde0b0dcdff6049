//! OBS Credentials Module
//!
//! Resolves the access key / secret key / optional security token used to
//! sign requests.
//!
//! # Sources
//!
//! - `CredentialsProvider::from_config` - keys set in the `obs` config section
//! - `CredentialsProvider::from_env` - `OBS_*` variables, then the `AWS_*` names
//! - `CredentialsProvider::resolve` - config first, environment as fallback
//!
//! # Example
//!
//! ```
//! use obs_uploadr::auth::Credentials;
//!
//! let creds = Credentials::new("access-key", "secret-key");
//! assert_eq!(creds.access_key_id(), "access-key");
//! assert!(creds.session_token().is_none());
//! ```

use crate::config::ObsConfig;
use thiserror::Error;

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Credentials for request signing
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Create credentials with session token (for temporary credentials)
    pub fn with_session_token(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: Some(session_token.into()),
        }
    }

    /// Get the access key ID
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Get the session token (if any)
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Reject blank keys before they reach the signer
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.access_key_id.trim().is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "access key is empty".into(),
            ));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "secret key is empty".into(),
            ));
        }
        Ok(())
    }
}

// Keeps secrets out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Factory methods for loading credentials
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Load credentials from environment variables
    ///
    /// Looks for (first match wins):
    /// - `OBS_ACCESS_KEY_ID` / `AWS_ACCESS_KEY_ID`
    /// - `OBS_SECRET_ACCESS_KEY` / `AWS_SECRET_ACCESS_KEY`
    /// - `OBS_SECURITY_TOKEN` / `AWS_SESSION_TOKEN` (optional)
    pub fn from_env() -> Result<Credentials, CredentialsError> {
        let access_key = env_first(&["OBS_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"]).ok_or_else(|| {
            CredentialsError::MissingCredentials(
                "OBS_ACCESS_KEY_ID / AWS_ACCESS_KEY_ID not set".into(),
            )
        })?;

        let secret_key = env_first(&["OBS_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"])
            .ok_or_else(|| {
                CredentialsError::MissingCredentials(
                    "OBS_SECRET_ACCESS_KEY / AWS_SECRET_ACCESS_KEY not set".into(),
                )
            })?;

        let session_token = env_first(&["OBS_SECURITY_TOKEN", "AWS_SESSION_TOKEN"]);

        let credentials = match session_token {
            Some(token) => Credentials::with_session_token(access_key, secret_key, token),
            None => Credentials::new(access_key, secret_key),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load credentials from the `obs` config section
    pub fn from_config(config: &ObsConfig) -> Result<Credentials, CredentialsError> {
        let access_key = config.access_key.as_ref().ok_or_else(|| {
            CredentialsError::MissingCredentials("access_key not set in config".into())
        })?;

        let secret_key = config.secret_key.as_ref().ok_or_else(|| {
            CredentialsError::MissingCredentials("secret_key not set in config".into())
        })?;

        let credentials = match &config.security_token {
            Some(token) => {
                Credentials::with_session_token(access_key.clone(), secret_key.clone(), token.clone())
            }
            None => Credentials::new(access_key.clone(), secret_key.clone()),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Config keys when either is set (both are then required), otherwise
    /// the environment
    pub fn resolve(config: &ObsConfig) -> Result<Credentials, CredentialsError> {
        if config.access_key.is_some() || config.secret_key.is_some() {
            return Self::from_config(config);
        }
        tracing::debug!("No keys in config, loading credentials from environment");
        Self::from_env()
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}
