//! # Application State Management
//!
//! Shared state handed to every request handler.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use registry_server::{AppState, Config};
//!
//! let state = Arc::new(AppState::from_config(
//!     Config::default(),
//!     "/path/to/data".into(),
//!     "http://localhost:3080".to_string(),
//! )?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::Config;
use crate::cost::ResolverSettings;
use crate::error::AppResult;
use crate::fetcher::NpmPackageSource;
use crate::local_storage::FsPackageStore;
use crate::registry_trait::PackageSource;
use crate::upstream::UpstreamClient;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state containing shared configuration and collaborators.
///
/// Wrapped in an `Arc` and shared across handlers. Nothing in here is
/// mutated per request: resolution state lives inside each cost request.
#[derive(Clone)]
pub struct AppState {
    /// Full server address including scheme, host, and port (e.g., "http://localhost:3080")
    pub server_addr: String,
    /// Application configuration
    pub config: Arc<Config>,
    /// Local package store for ingested (root) packages
    pub store: Arc<FsPackageStore>,
    /// Remote source used to resolve dependencies
    pub source: Arc<dyn PackageSource>,
}

impl AppState {
    /// Build the production state: filesystem store under `data_dir` and
    /// the npm registry configured in `config` as dependency source.
    pub fn from_config(config: Config, data_dir: PathBuf, server_addr: String) -> AppResult<Self> {
        let client = Arc::new(UpstreamClient::new(config.upstream_config())?);
        let source = NpmPackageSource::new(client)
            .with_fetch_timeout(config.fetch_timeout())
            .with_manifest_filename(config.resolver.manifest_filename.clone());

        Ok(Self::with_source(config, data_dir, server_addr, Arc::new(source)))
    }

    /// Build state around a caller-provided dependency source.
    pub fn with_source(
        config: Config,
        data_dir: PathBuf,
        server_addr: String,
        source: Arc<dyn PackageSource>,
    ) -> Self {
        Self {
            store: Arc::new(FsPackageStore::new(data_dir)),
            server_addr,
            config: Arc::new(config),
            source,
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            manifest_filename: self.config.resolver.manifest_filename.clone(),
        }
    }
}
