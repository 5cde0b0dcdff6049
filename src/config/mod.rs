//! Configuration module for OBS Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

use crate::upload::segment::{DEFAULT_MAX_FILE_SIZE, DEFAULT_SEGMENT_SIZE};

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        // Append the text before the match
        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub obs: ObsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.obs.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "obs.bucket must not be empty".into(),
            ));
        }

        if self.obs.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "obs.region must not be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.obs.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid OBS endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.obs.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "obs.timeout_seconds must be greater than 0".into(),
            ));
        }

        if self.upload.segment_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.segment_size must be greater than 0".into(),
            ));
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size must be greater than 0".into(),
            ));
        }

        if self.upload.concurrent_segments == 0 {
            return Err(ConfigError::ValidationError(
                "upload.concurrent_segments must be at least 1".into(),
            ));
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid logging format '{}': must be 'json' or 'text'",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}

/// How the bucket is addressed in request URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingStyle {
    /// `https://<bucket>.<endpoint-host>/<key>`
    #[default]
    VirtualHost,
    /// `<endpoint>/<bucket>/<key>`
    Path,
}

/// OBS endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsConfig {
    pub bucket: String,
    pub region: String,
    /// Defaults to `https://obs.<region>.otc.t-systems.com`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub addressing_style: AddressingStyle,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub security_token: Option<String>,
    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    300
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Files larger than this are uploaded as multipart segments of this size
    #[serde(default = "default_segment_size")]
    pub segment_size: u64,
    /// Upper bound a segment is clamped to
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_concurrent_segments")]
    pub concurrent_segments: usize,
    /// Send `UNSIGNED-PAYLOAD` for file-backed bodies instead of hashing them
    #[serde(default)]
    pub unsigned_payload: bool,
    /// Store the file SHA-256 as object metadata
    #[serde(default = "default_checksum_metadata")]
    pub checksum_metadata: bool,
    /// Skip files whose stored checksum and size already match
    #[serde(default)]
    pub skip_unchanged: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            segment_size: default_segment_size(),
            max_file_size: default_max_file_size(),
            concurrent_segments: default_concurrent_segments(),
            unsigned_payload: false,
            checksum_metadata: default_checksum_metadata(),
            skip_unchanged: false,
        }
    }
}

fn default_segment_size() -> u64 {
    DEFAULT_SEGMENT_SIZE
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_concurrent_segments() -> usize {
    4
}

fn default_checksum_metadata() -> bool {
    true
}

/// Logging configuration
///
/// `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_config() -> Config {
        Config {
            obs: ObsConfig {
                bucket: "bucket".into(),
                region: "eu-de".into(),
                endpoint: None,
                addressing_style: AddressingStyle::default(),
                access_key: None,
                secret_key: None,
                security_token: None,
                timeout_seconds: default_timeout_seconds(),
            },
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    #[test]
    fn test_default_upload_config() {
        let config = UploadConfig::default();
        assert_eq!(config.segment_size, 1024 * 1024 * 1024);
        assert_eq!(config.concurrent_segments, 4);
        assert!(config.checksum_metadata);
        assert!(!config.unsigned_payload);
    }

    #[test]
    fn test_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validation_empty_bucket() {
        let mut config = test_config();
        config.obs.bucket = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_endpoint() {
        let mut config = test_config();
        config.obs.endpoint = Some("obs.eu-de.otc.t-systems.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_segment_size() {
        let mut config = test_config();
        config.upload.segment_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let mut config = test_config();
        config.upload.concurrent_segments = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_log_format() {
        let mut config = test_config();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("OBS_UPLOADR_MISSING");
        std::env::set_var("OBS_UPLOADR_PRESENT", "value");

        assert_eq!(expand_env_vars("a-${OBS_UPLOADR_PRESENT}-b"), "a-value-b");
        assert_eq!(expand_env_vars("${OBS_UPLOADR_MISSING:-fallback}"), "fallback");
        assert_eq!(expand_env_vars("${OBS_UPLOADR_MISSING}"), "${OBS_UPLOADR_MISSING}");

        std::env::remove_var("OBS_UPLOADR_PRESENT");
    }
}
