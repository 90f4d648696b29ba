//! Filesystem-backed package store.
//!
//! Each ingested package lives in its own directory keyed by package id:
//!
//! ```text
//! {data_dir}/packages/{id}/metadata.json
//! {data_dir}/packages/{id}/package.zip | package.tgz
//! ```
//!
//! The metadata document is written last, so a package without one is
//! treated as absent.

use crate::archive::ArchiveFormat;
use crate::error::{AppError, AppResult};
use crate::registry_trait::{PackageStore, StoredPackage};
use crate::storage;
use crate::validation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const PACKAGES_DIR: &str = "packages";
const METADATA_FILE: &str = "metadata.json";

/// Metadata recorded alongside every stored archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub format: ArchiveFormat,
    pub size_bytes: u64,
    pub ingested_at: DateTime<Utc>,
}

/// Package store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FsPackageStore {
    data_dir: PathBuf,
}

impl FsPackageStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn packages_dir(&self) -> PathBuf {
        self.data_dir.join(PACKAGES_DIR)
    }

    /// Directory for `id`. Callers validate the id first.
    fn package_dir(&self, id: &str) -> PathBuf {
        self.packages_dir().join(id)
    }

    fn archive_path(&self, id: &str, format: ArchiveFormat) -> PathBuf {
        self.package_dir(id)
            .join(format!("package.{}", format.extension()))
    }

    /// Whether a complete package is stored under `id`.
    pub async fn exists(&self, id: &str) -> AppResult<bool> {
        if validation::validate_package_id(id).is_err() {
            return Ok(false);
        }
        Ok(fs::try_exists(self.package_dir(id).join(METADATA_FILE)).await?)
    }

    /// Read the metadata record for `id`, if stored.
    pub async fn load_record(&self, id: &str) -> AppResult<Option<PackageRecord>> {
        if let Err(e) = validation::validate_package_id(id) {
            debug!(id = %id, error = %e, "Rejected package id");
            return Ok(None);
        }

        let path = self.package_dir(id).join(METADATA_FILE);
        match storage::read_file(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist an archive and its metadata record.
    pub async fn save(&self, record: &PackageRecord, archive: &[u8]) -> AppResult<()> {
        validation::validate_package_id(&record.id)
            .map_err(|e| AppError::BadRequest(format!("Invalid package id: {e}")))?;

        storage::save_file(self.archive_path(&record.id, record.format), archive).await?;
        let metadata = serde_json::to_vec_pretty(record)?;
        storage::save_file(self.package_dir(&record.id).join(METADATA_FILE), metadata).await?;

        info!(
            id = %record.id,
            package = %record.name,
            version = %record.version,
            size = record.size_bytes,
            "Stored package"
        );
        Ok(())
    }

    /// Read the metadata record and archive bytes for `id`, if stored.
    pub async fn load(&self, id: &str) -> AppResult<Option<(PackageRecord, Vec<u8>)>> {
        let Some(record) = self.load_record(id).await? else {
            debug!(id = %id, "Package not in local store");
            return Ok(None);
        };

        let archive = storage::read_file(self.archive_path(id, record.format)).await?;
        Ok(Some((record, archive)))
    }

    /// Remove every stored package. Returns how many complete packages
    /// were removed.
    pub async fn reset(&self) -> AppResult<usize> {
        let packages_dir = self.packages_dir();
        if !fs::try_exists(&packages_dir).await? {
            return Ok(0);
        }

        let removed = self.list().await?.len();
        fs::remove_dir_all(&packages_dir).await?;
        info!(removed, "Cleared package store");
        Ok(removed)
    }

    /// All stored packages, ordered by name then version.
    pub async fn list(&self) -> AppResult<Vec<PackageRecord>> {
        let packages_dir = self.packages_dir();
        if !fs::try_exists(&packages_dir).await? {
            debug!("Packages directory does not exist");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&packages_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load_record(&id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!(id = %id, "Skipping incomplete package directory"),
                Err(e) => warn!(id = %id, error = %e, "Skipping unreadable package"),
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
        Ok(records)
    }
}

#[async_trait]
impl PackageStore for FsPackageStore {
    async fn load_by_local_id(&self, id: &str) -> AppResult<Option<StoredPackage>> {
        let Some((record, archive)) = self.load(id).await? else {
            return Ok(None);
        };

        Ok(Some(StoredPackage {
            archive,
            format: record.format,
            name: Some(record.name),
            version: Some(record.version),
        }))
    }
}
