//! Process-wide extraction configuration.
//!
//! Loaded once at startup and shared read-only afterwards. Values come
//! from environment variables (optionally via a `.env` file) and fall back
//! to [`crate::defaults`].
//!
//! # Example
//!
//! ```rust,no_run
//! use filemeta_core::config::MetadataConfig;
//!
//! // .env + environment, falling back to defaults
//! let config = MetadataConfig::load().expect("invalid metadata config");
//! if config.is_supported("image/jpeg") {
//!     println!("sections kept: {}", config.allow_list);
//! }
//! ```

use std::collections::BTreeSet;
use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::defaults;
use crate::filter::AllowList;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Allow list and supported formats for metadata extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Sections kept in the extracted metadata bag.
    #[serde(default)]
    pub allow_list: AllowList,
    /// Lowercase MIME types eligible for extraction.
    #[serde(default = "MetadataConfig::default_supported_formats")]
    pub supported_formats: BTreeSet<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            allow_list: AllowList::default(),
            supported_formats: Self::default_supported_formats(),
        }
    }
}

impl MetadataConfig {
    fn default_supported_formats() -> BTreeSet<String> {
        defaults::SUPPORTED_FILE_METADATA_FORMATS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Load a `.env` file if present, then read the environment.
    pub fn load() -> ConfigResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let config = Self::from_env();
        config.validate()?;
        info!(
            allow_list = %config.allow_list,
            formats = config.supported_formats.len(),
            "Metadata extraction config loaded"
        );
        Ok(config)
    }

    /// Read configuration from environment variables, using defaults for
    /// anything unset or blank.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(raw) = non_empty_var(defaults::ENV_FILE_METADATA_ALLOW_LIST) {
            config.allow_list = raw.parse().unwrap_or_default();
        }

        if let Some(raw) = non_empty_var(defaults::ENV_SUPPORTED_FILE_METADATA_FORMATS) {
            config.supported_formats = parse_formats(&raw);
        }

        config
    }

    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn with_supported_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.supported_formats = formats
            .into_iter()
            .map(|f| f.as_ref().trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    /// Whether `mime_type` is eligible for extraction.
    ///
    /// Comparison ignores case and any `; charset=...` style parameters.
    pub fn is_supported(&self, mime_type: &str) -> bool {
        self.supported_formats.contains(&normalize_mime(mime_type))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for format in &self.supported_formats {
            if !format.contains('/') {
                return Err(ConfigError::Validation(format!(
                    "Supported format is not a MIME type: {}",
                    format
                )));
            }
        }
        Ok(())
    }
}

/// Lowercase a MIME type and strip its parameters.
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn parse_formats(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(normalize_mime)
        .filter(|f| !f.is_empty())
        .collect()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a positive number of seconds from `name`, or `default` when unset.
pub fn env_secs(name: &'static str, default: u64) -> ConfigResult<u64> {
    let Some(raw) = non_empty_var(name) else {
        return Ok(default);
    };
    parse_secs(name, &raw)
}

fn parse_secs(name: &'static str, raw: &str) -> ConfigResult<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnv {
            name,
            message: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::InvalidEnv {
            name,
            message: format!("{} ({:?})", e, raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetadataConfig::default();
        assert_eq!(config.allow_list, AllowList::sections(["ifd0", "exif"]));
        assert!(config.is_supported("image/jpeg"));
        assert!(config.is_supported("video/mp4"));
        assert!(!config.is_supported("application/pdf"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_supported_normalizes() {
        let config = MetadataConfig::default();
        assert!(config.is_supported("IMAGE/PNG"));
        assert!(config.is_supported("audio/mpeg; charset=binary"));
    }

    #[test]
    fn test_with_supported_formats() {
        let config = MetadataConfig::default().with_supported_formats([" Image/HEIC ", ""]);
        assert_eq!(config.supported_formats.len(), 1);
        assert!(config.is_supported("image/heic"));
        assert!(!config.is_supported("image/jpeg"));
    }

    #[test]
    fn test_validate_rejects_non_mime() {
        let config = MetadataConfig::default().with_supported_formats(["jpeg"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_formats() {
        let formats = parse_formats("image/jpeg, VIDEO/MP4 ,,");
        assert_eq!(formats.len(), 2);
        assert!(formats.contains("video/mp4"));
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("T", " 30 ").unwrap(), 30);
        assert!(matches!(
            parse_secs("T", "0"),
            Err(ConfigError::InvalidEnv { name: "T", .. })
        ));
        assert!(parse_secs("T", "soon").is_err());
    }

    #[test]
    fn test_env_secs_default_when_unset() {
        assert_eq!(env_secs("FILEMETA_TEST_UNSET_TIMEOUT", 7).unwrap(), 7);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: MetadataConfig =
            serde_json::from_value(serde_json::json!({ "allow_list": "*" })).unwrap();
        assert_eq!(config.allow_list, AllowList::All);
        assert!(config.is_supported("image/webp"));
    }
}
