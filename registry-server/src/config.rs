//! # Configuration Management
//!
//! Configuration for the registry server, loaded from an optional JSON file.
//! Every section has defaults, so a partial file (or none at all) is valid:
//!
//! - [`ServerConfig`]: bind host and port
//! - [`StorageConfig`]: local package store location
//! - [`UpstreamSettings`]: remote npm registry connection settings
//! - [`ResolverConfig`]: dependency resolution tuning
//! - [`LimitsConfig`]: upload limits
//!
//! ```rust,no_run
//! # use registry_server::config::Config;
//! // Load from file with fallback to defaults
//! let config = Config::load_or_default("registry.json")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::AppResult;
use crate::upstream::UpstreamConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for the registry server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration (host, port)
    pub server: ServerConfig,
    /// Local package store location
    pub storage: StorageConfig,
    /// Remote registry settings
    pub upstream: UpstreamSettings,
    /// Dependency resolution settings
    pub resolver: ResolverConfig,
    /// Upload limits
    pub limits: LimitsConfig,
}

/// Server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Default host/IP address to bind to
    pub default_host: String,
    /// Default port number to listen on
    pub default_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_host: "0.0.0.0".to_string(),
            default_port: 3080,
        }
    }
}

/// Storage configuration for ingested packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for all package storage
    pub default_data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_data_dir: PathBuf::from("./data"),
        }
    }
}

/// Remote npm registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Base URL of the npm registry
    pub npm_url: String,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Whether remote lookups are performed at all
    pub enabled: bool,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        let defaults = UpstreamConfig::default();
        Self {
            npm_url: defaults.npm_url,
            request_timeout_secs: defaults.timeout.as_secs(),
            enabled: defaults.enabled,
        }
    }
}

/// Dependency resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on one dependency fetch (metadata, tarball and manifest
    /// extraction together). Exceeding it marks the dependency unresolved.
    pub fetch_timeout_secs: u64,
    /// Manifest file looked up inside package archives
    pub manifest_filename: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 60,
            manifest_filename: crate::archive::MANIFEST_FILENAME.to_string(),
        }
    }
}

/// Upload limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_size_mb: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_upload_size_mb: 100,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not contain a
    /// valid configuration document.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Load configuration from file with fallback to defaults.
    ///
    /// A missing file yields [`Config::default`]; a file that exists but
    /// cannot be parsed is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the maximum upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> usize {
        self.limits.max_upload_size_mb * 1024 * 1024
    }

    /// Upstream client configuration derived from the `upstream` section.
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            npm_url: self.upstream.npm_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.upstream.request_timeout_secs),
            enabled: self.upstream.enabled,
        }
    }

    /// Per-dependency fetch deadline.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver.fetch_timeout_secs)
    }
}
