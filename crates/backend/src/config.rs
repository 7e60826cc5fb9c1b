//! Backend configuration via `siftlog.toml`
//!
//! Two sections:
//! - `[engine]`: how to reach the document engine
//! - `[storage]`: index layout, paging and provisioning settings
//!
//! Every key has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use siftlog_core::{Error, Result, DEFAULT_PAGE_SIZE};
use siftlog_engine::HttpEngineConfig;
use siftlog_query::IndexLayout;
use std::path::Path;

/// Config file name looked up by deployments
pub const CONFIG_FILE_NAME: &str = "siftlog.toml";

/// Index layout, paging and provisioning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Share one index family between all tenants and clusters
    #[serde(default)]
    pub single_index: bool,
    /// Total hits above which a list switches to point-in-time paging
    #[serde(default = "default_deep_pagination_cutoff")]
    pub deep_pagination_cutoff: u64,
    /// Keep-alive requested for points in time
    #[serde(default = "default_pit_keep_alive")]
    pub pit_keep_alive: String,
    /// Page size used when a request asks for 0
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Primary shards of provisioned indices
    #[serde(default = "default_shards")]
    pub shards: u32,
    /// Replicas of provisioned indices
    #[serde(default)]
    pub replicas: u32,
}

fn default_deep_pagination_cutoff() -> u64 {
    10_000
}

fn default_pit_keep_alive() -> String {
    "5m".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_shards() -> u32 {
    1
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            single_index: false,
            deep_pagination_cutoff: default_deep_pagination_cutoff(),
            pit_keep_alive: default_pit_keep_alive(),
            default_page_size: default_page_size(),
            shards: default_shards(),
            replicas: 0,
        }
    }
}

impl StorageConfig {
    /// Builder: pick the index layout
    pub fn with_single_index(mut self, single_index: bool) -> Self {
        self.single_index = single_index;
        self
    }

    /// Builder: set the deep pagination cutoff
    pub fn with_deep_pagination_cutoff(mut self, cutoff: u64) -> Self {
        self.deep_pagination_cutoff = cutoff;
        self
    }

    pub fn layout(&self) -> IndexLayout {
        IndexLayout::from_single_index(self.single_index)
    }

    /// Check the values are usable.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.deep_pagination_cutoff == 0 {
            return Err(Error::invalid_request(
                "storage.deep_pagination_cutoff must be greater than 0",
            ));
        }
        if self.default_page_size == 0 {
            return Err(Error::invalid_request(
                "storage.default_page_size must be greater than 0",
            ));
        }
        if self.shards == 0 {
            return Err(Error::invalid_request("storage.shards must be greater than 0"));
        }
        if !is_duration(&self.pit_keep_alive) {
            return Err(Error::invalid_request(format!(
                "Invalid storage.pit_keep_alive '{}'. \
                 Expected a number followed by ms, s, m, h or d.",
                self.pit_keep_alive
            )));
        }
        Ok(())
    }
}

fn is_duration(value: &str) -> bool {
    let digits = value.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let unit = &value[digits.len()..];
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && matches!(unit, "ms" | "s" | "m" | "h" | "d")
}

/// Backend configuration loaded from `siftlog.toml`.
///
/// # Example
///
/// ```toml
/// [engine]
/// url = "https://logs-engine:9200"
/// username = "siftlog"
///
/// [storage]
/// single_index = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub engine: HttpEngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl BackendConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# siftlog backend configuration

[engine]
# Base URL of the document engine
url = "https://localhost:9200"
# Basic auth credentials (optional)
# username = "siftlog"
# password = "changeme"
# PEM bundle trusted in addition to the system roots (optional)
# ca_cert_path = "/etc/siftlog/ca.pem"
# Per-request timeout in milliseconds
request_timeout_ms = 30000

[storage]
# false = one index family per tenant and cluster
# true  = one shared index family, isolation by tenancy filter
single_index = false
# Lists with more hits than this page through a point in time
deep_pagination_cutoff = 10000
# How long an idle point in time is kept by the engine
pit_keep_alive = "5m"
# Page size used when a request asks for 0
default_page_size = 1000
# Settings of provisioned indices
shards = 1
replicas = 0
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the text cannot be parsed or a value
    /// is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BackendConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_request(format!("Failed to parse config: {}", e)))?;
        config.storage.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_request(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: BackendConfig = toml::from_str(&content).map_err(|e| {
            Error::invalid_request(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate eagerly so a bad file fails at startup
        config.storage.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_toml_parses_to_defaults() {
        let config = BackendConfig::from_toml_str(BackendConfig::default_toml()).unwrap();
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.storage.layout(), IndexLayout::MultiIndex);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = BackendConfig::from_toml_str("").unwrap();
        assert_eq!(config.storage.deep_pagination_cutoff, 10_000);
        assert_eq!(config.storage.pit_keep_alive, "5m");
        assert_eq!(config.storage.default_page_size, 1000);
        assert_eq!(config.engine.url, "https://localhost:9200");
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let content = r#"
[engine]
url = "https://engine:9200"
username = "u"

[storage]
single_index = true
replicas = 2
"#;
        std::fs::write(&path, content).unwrap();
        let config = BackendConfig::from_file(&path).unwrap();
        assert_eq!(config.engine.url, "https://engine:9200");
        assert_eq!(config.engine.username.as_deref(), Some("u"));
        assert_eq!(config.storage.layout(), IndexLayout::SingleIndex);
        assert_eq!(config.storage.replicas, 2);
        assert_eq!(config.storage.shards, 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = BackendConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err =
            BackendConfig::from_toml_str("[storage]\npit_keep_alive = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("pit_keep_alive"));
        let err =
            BackendConfig::from_toml_str("[storage]\ndeep_pagination_cutoff = 0\n").unwrap_err();
        assert!(err.is_validation());
        let err = BackendConfig::from_toml_str("[storage]\nshards = \"two\"\n").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse config"));
    }

    #[test]
    fn test_duration_syntax() {
        assert!(is_duration("5m"));
        assert!(is_duration("250ms"));
        assert!(is_duration("1d"));
        assert!(!is_duration("m"));
        assert!(!is_duration("5"));
        assert!(!is_duration("5 m"));
        assert!(!is_duration("-5m"));
    }
}
