//! Remote dependency fetcher backed by the npm registry.

use crate::archive::{extract_manifest_owned, ArchiveError, ArchiveFormat, MANIFEST_FILENAME};
use crate::cost::size_mb;
use crate::error::AppError;
use crate::npm_range::{parse_constraint, select_version, split_alias};
use crate::registry_trait::{FetchOutcome, PackageSource, ResolvedPackage, UnresolvedReason};
use crate::upstream::UpstreamClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves dependency constraints against an npm registry: picks the
/// highest matching version, downloads its tarball and reads the manifest.
pub struct NpmPackageSource {
    client: Arc<UpstreamClient>,
    manifest_filename: String,
    fetch_timeout: Duration,
}

impl NpmPackageSource {
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        Self {
            client,
            manifest_filename: MANIFEST_FILENAME.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Deadline for one whole fetch (metadata, tarball and manifest).
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_manifest_filename(mut self, manifest_filename: impl Into<String>) -> Self {
        self.manifest_filename = manifest_filename.into();
        self
    }

    async fn try_fetch(
        &self,
        name: &str,
        constraint: &str,
    ) -> Result<ResolvedPackage, UnresolvedReason> {
        if !self.client.is_enabled() {
            return Err(UnresolvedReason::Disabled);
        }

        let (target, range) = split_alias(constraint).unwrap_or((name, constraint));
        let parsed = parse_constraint(range).ok_or(UnresolvedReason::UnsupportedConstraint)?;

        let packument = self
            .client
            .fetch_npm_document(target)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => UnresolvedReason::UnknownPackage,
                other => UnresolvedReason::Transport(other.to_string()),
            })?;

        let version = select_version(
            packument.versions.keys().map(String::as_str),
            &packument.dist_tags,
            &parsed,
        )
        .ok_or(UnresolvedReason::NoMatchingVersion)?;
        debug!(package = %target, constraint = %range, version = %version, "Selected version");

        let tarball_url = packument
            .tarball_url(&version)
            .ok_or(UnresolvedReason::MissingTarball)?;
        let tarball = self
            .client
            .download_tarball(tarball_url)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => UnresolvedReason::MissingTarball,
                other => UnresolvedReason::Transport(other.to_string()),
            })?;

        let standalone_cost = size_mb(&tarball);
        let format = ArchiveFormat::detect(&tarball).unwrap_or(ArchiveFormat::TarGz);
        let manifest = extract_manifest_owned(tarball, format, self.manifest_filename.clone())
            .await
            .map_err(|e| match e {
                ArchiveError::MalformedManifest { .. } => {
                    UnresolvedReason::MalformedManifest(e.to_string())
                }
                ArchiveError::Corrupt(msg) => UnresolvedReason::CorruptArchive(msg),
            })?
            .ok_or(UnresolvedReason::MissingManifest)?;

        Ok(ResolvedPackage {
            version,
            manifest,
            standalone_cost,
        })
    }
}

#[async_trait]
impl PackageSource for NpmPackageSource {
    async fn fetch(&self, name: &str, constraint: &str) -> FetchOutcome {
        match tokio::time::timeout(self.fetch_timeout, self.try_fetch(name, constraint)).await {
            Ok(Ok(package)) => FetchOutcome::Resolved(package),
            Ok(Err(reason)) => {
                warn!(package = %name, constraint = %constraint, reason = %reason, "Dependency fetch failed");
                FetchOutcome::Unresolved(reason)
            }
            Err(_) => {
                warn!(
                    package = %name,
                    constraint = %constraint,
                    timeout_secs = self.fetch_timeout.as_secs(),
                    "Dependency fetch timed out"
                );
                FetchOutcome::Unresolved(UnresolvedReason::TimedOut)
            }
        }
    }
}
