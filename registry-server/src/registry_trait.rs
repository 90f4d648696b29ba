//! Collaborator contracts for cost resolution.
//!
//! The resolver only talks to its collaborators through these traits:
//!
//! ```text
//! PackageStore  (local, root packages)   ── FsPackageStore
//! PackageSource (remote, dependencies)   ── NpmPackageSource
//! ```

use crate::archive::ArchiveFormat;
use crate::error::AppResult;
use crate::manifest::Manifest;
use async_trait::async_trait;

/// A package loaded from the local store.
#[derive(Debug, Clone)]
pub struct StoredPackage {
    pub archive: Vec<u8>,
    pub format: ArchiveFormat,
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Read access to locally ingested packages.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Load a package by its local id.
    ///
    /// `Ok(None)` means the id is unknown; `Err` is reserved for storage
    /// failures.
    async fn load_by_local_id(&self, id: &str) -> AppResult<Option<StoredPackage>>;
}

/// A dependency resolved against the remote registry.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// Concrete version the constraint resolved to
    pub version: String,
    pub manifest: Manifest,
    /// Archive size in megabytes
    pub standalone_cost: f64,
}

/// Why a dependency could not be resolved.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnresolvedReason {
    #[error("remote registry lookups are disabled")]
    Disabled,
    #[error("package is unknown to the registry")]
    UnknownPackage,
    #[error("constraint does not refer to registry versions")]
    UnsupportedConstraint,
    #[error("no published version satisfies the constraint")]
    NoMatchingVersion,
    #[error("resolved version has no tarball")]
    MissingTarball,
    #[error("registry request failed: {0}")]
    Transport(String),
    #[error("archive could not be read: {0}")]
    CorruptArchive(String),
    #[error("archive has no manifest")]
    MissingManifest,
    #[error("manifest could not be read: {0}")]
    MalformedManifest(String),
    #[error("fetch timed out")]
    TimedOut,
}

/// Outcome of fetching one dependency.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Resolved(ResolvedPackage),
    Unresolved(UnresolvedReason),
}

/// Remote lookup of dependencies by name and constraint.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Resolve `constraint` for `name`, download the archive and read its
    /// manifest. Every failure is reported as [`FetchOutcome::Unresolved`].
    async fn fetch(&self, name: &str, constraint: &str) -> FetchOutcome;
}
