use crate::validation::{validate_file_size, MAX_UPLOAD_SIZE};
use crate::{AppError, AppResult};
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Connection settings for the remote npm registry.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use registry_server::upstream::UpstreamConfig;
///
/// let config = UpstreamConfig {
///     npm_url: "http://127.0.0.1:4873".to_string(),
///     timeout: Duration::from_secs(10),
///     enabled: true,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL for the npm registry API, without a trailing slash
    pub npm_url: String,
    /// HTTP request timeout for upstream calls
    pub timeout: Duration,
    /// Whether upstream registry lookups are enabled
    pub enabled: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            npm_url: "https://registry.npmjs.org".to_string(),
            timeout: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// The subset of an npm package document ("packument") used for version
/// resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Packument {
    #[serde(default)]
    pub versions: HashMap<String, PackumentVersion>,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackumentVersion {
    #[serde(default)]
    pub dist: Option<Dist>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dist {
    #[serde(default)]
    pub tarball: Option<String>,
}

impl Packument {
    /// Tarball URL published for `version`, if any.
    pub fn tarball_url(&self, version: &str) -> Option<&str> {
        self.versions
            .get(version)?
            .dist
            .as_ref()?
            .tarball
            .as_deref()
            .filter(|url| !url.is_empty())
    }
}

/// HTTP client for the remote npm registry.
///
/// Errors follow one convention: [`AppError::NotFound`] when the registry
/// answers that a package or tarball does not exist (or lookups are
/// disabled), [`AppError::InternalError`] for transport and decoding
/// failures.
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use registry_server::upstream::{UpstreamClient, UpstreamConfig};
///
/// let client = UpstreamClient::new(UpstreamConfig::default())?;
/// let packument = client.fetch_npm_document("express").await?;
/// if let Some(url) = packument.tarball_url("4.18.2") {
///     let tarball = client.download_tarball(url).await?;
///     println!("{} bytes", tarball.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
    config: UpstreamConfig,
    max_tarball_bytes: u64,
}

impl UpstreamClient {
    /// Create a new upstream client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `npm_url` is not a valid URL or the underlying
    /// HTTP client cannot be created.
    pub fn new(config: UpstreamConfig) -> AppResult<Self> {
        let base_url = Url::parse(&format!("{}/", config.npm_url.trim_end_matches('/')))
            .map_err(|e| {
                AppError::InternalError(format!("Invalid npm registry URL {}: {e}", config.npm_url))
            })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("registry-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            config,
            max_tarball_bytes: MAX_UPLOAD_SIZE,
        })
    }

    /// Override the largest tarball accepted by [`download_tarball`](Self::download_tarball).
    pub fn with_max_tarball_bytes(mut self, max: u64) -> Self {
        self.max_tarball_bytes = max;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn ensure_enabled(&self) -> AppResult<()> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(AppError::NotFound(
                "Upstream registry lookup is disabled in configuration".to_string(),
            ))
        }
    }

    /// Registry URL for a package document. Scoped names keep their `@`
    /// but encode the separating slash.
    fn document_url(&self, package_name: &str) -> AppResult<Url> {
        let path = package_name.replacen('/', "%2F", 1);
        self.base_url
            .join(&path)
            .map_err(|e| AppError::InternalError(format!("Invalid package name {package_name}: {e}")))
    }

    /// Fetch the package document listing every published version.
    pub async fn fetch_npm_document(&self, package_name: &str) -> AppResult<Packument> {
        self.ensure_enabled()?;

        let url = self.document_url(package_name)?;
        debug!(url = %url, "Fetching NPM metadata");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/vnd.npm.install-v1+json")
            .send()
            .await
            .map_err(|e| {
                warn!(package = %package_name, error = %e, "Failed to fetch from NPM");
                AppError::InternalError(format!("Request for {package_name} failed: {e}"))
            })?;

        match response.status() {
            status if status.is_success() => {
                let packument: Packument = response.json().await.map_err(|e| {
                    AppError::InternalError(format!("Failed to parse NPM response: {e}"))
                })?;
                info!(
                    package = %package_name,
                    versions = packument.versions.len(),
                    "Successfully fetched from NPM"
                );
                Ok(packument)
            }
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
                "Package not found on NPM: {package_name}"
            ))),
            status => Err(AppError::InternalError(format!(
                "NPM returned {status} for {package_name}"
            ))),
        }
    }

    /// Download a tarball. Relative URLs are resolved against the registry.
    pub async fn download_tarball(&self, tarball_url: &str) -> AppResult<bytes::Bytes> {
        self.ensure_enabled()?;

        let url = Url::parse(tarball_url)
            .or_else(|_| self.base_url.join(tarball_url.trim_start_matches('/')))
            .map_err(|e| AppError::InternalError(format!("Invalid tarball URL {tarball_url}: {e}")))?;
        debug!(url = %url, "Downloading tarball from NPM");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to fetch tarball from NPM");
            AppError::InternalError(format!("Tarball request failed: {e}"))
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AppError::NotFound(format!("Tarball not found on NPM: {url}")))
            }
            status => {
                return Err(AppError::InternalError(format!(
                    "NPM returned {status} for tarball {url}"
                )))
            }
        }

        if let Some(content_length) = response.content_length() {
            validate_file_size(content_length, Some(self.max_tarball_bytes))
                .map_err(|e| AppError::InternalError(format!("NPM tarball too large: {e}")))?;
        }

        // Content-Length is optional, so the limit is also enforced while reading.
        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::InternalError(format!("Failed to read NPM tarball: {e}")))?;
            validate_file_size((buffer.len() + chunk.len()) as u64, Some(self.max_tarball_bytes))
                .map_err(|e| {
                    warn!(url = %url, limit = self.max_tarball_bytes, "Aborting oversized tarball download");
                    AppError::InternalError(format!("NPM tarball too large: {e}"))
                })?;
            buffer.extend_from_slice(&chunk);
        }
        let bytes = buffer.freeze();

        info!(url = %url, size = bytes.len(), "Downloaded tarball");
        Ok(bytes)
    }
}
