//! Configuration loading and management

mod io;
mod portal;
mod settings;
mod token;

pub use portal::{
    DeactivationSettings, DeactivationStyle, PortalConfig, PortalCredentials, RetrySettings,
};
pub use settings::{ServerSettings, StoreSettings, SyncSettings};
pub use token::generate_control_token;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Problems found by [`Config::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("portal.credentials.{0} must be set")]
    MissingCredential(&'static str),

    #[error("{field} is not an http(s) URL: {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check everything a sync run depends on, reporting all problems at once
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        let creds = &self.portal.credentials;

        if creds.api_key.trim().is_empty() {
            errors.push(ConfigError::MissingCredential("api_key"));
        }
        if creds.api_secret.trim().is_empty() {
            errors.push(ConfigError::MissingCredential("api_secret"));
        }
        for (field, value) in [
            ("portal.base_url", &self.portal.base_url),
            ("portal.credentials.token_url", &creds.token_url),
        ] {
            if !is_http_url(value) {
                errors.push(ConfigError::InvalidUrl {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.portal.timeout_secs == 0 {
            errors.push(ConfigError::Zero("portal.timeout_secs"));
        }
        if self.sync.workers == 0 {
            errors.push(ConfigError::Zero("sync.workers"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Like [`Config::validate`], folded into one error for `?`
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
            anyhow::anyhow!("Invalid configuration:\n{}", lines.join("\n"))
        })
    }

    /// SQLite path for the entity store
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("crm.db"))
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("http://") || value.starts_with("https://"))
        && value.split("://").nth(1).is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[portal]
base_url = "https://portal.test"
timeout_secs = 10

[portal.credentials]
api_key = "key-123"
api_secret = "secret-456"
token_url = "https://portal.test/v1/auth/token"

[portal.deactivation]
style = "delete"

[sync]
workers = 4
"#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.portal.base_url, "https://portal.test");
        assert_eq!(config.portal.listings_path, "/v1/listings");
        assert_eq!(config.portal.deactivation.style, DeactivationStyle::Delete);
        assert_eq!(config.portal.retry.max_retries, 2);
        assert_eq!(config.sync.workers, 4);
        assert_eq!(config.server.port, 9877);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = Config::default();
        config.portal.base_url = "ftp://portal.test".to_string();
        config.sync.workers = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ConfigError::MissingCredential("api_key"),
                ConfigError::MissingCredential("api_secret"),
                ConfigError::InvalidUrl {
                    field: "portal.base_url",
                    value: "ftp://portal.test".to_string(),
                },
                ConfigError::Zero("sync.workers"),
            ]
        );
    }

    #[test]
    fn test_toml_roundtrip_keeps_defaults() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.portal.deactivation.status_value, "inactive");
        assert_eq!(parsed.sync.workers, 1);
    }
}
