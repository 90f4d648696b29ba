//! # Package Registry Cost Engine
//!
//! A package registry backend that stores uploaded packages and computes
//! what installing them costs: the size of a package's own archive and,
//! optionally, the transitive size of everything it depends on.
//!
//! ## Key Modules
//!
//! - [`resolver`]: recursive dependency resolution with memoization and cycle detection
//! - [`cost`]: size calculation, cost records and the cost request handler
//! - [`fetcher`]: dependency lookup against the npm registry
//! - [`archive`]: manifest extraction from zip and gzip-tar archives
//! - [`local_storage`]: filesystem store for ingested packages
//! - [`ingest`]: package upload handling
//! - [`upstream`]: HTTP client for the npm registry
//! - [`config`]: configuration management and settings
//! - [`error`]: error handling and standardized responses
//! - [`validation`]: input validation utilities
//!
//! Collaborators are reached through the traits in [`registry_trait`], so
//! the resolver can run against any store and source.

pub mod archive;
pub mod config;
pub mod cost;
pub mod error;
pub mod fetcher;
pub mod ingest;
pub mod local_storage;
pub mod manifest;
pub mod npm_range;
pub mod registry_trait;
pub mod resolver;
pub mod server;
pub mod state;
pub mod storage;
pub mod upstream;
pub mod validation;

pub use config::Config;
pub use cost::{compute_cost, size_mb, CostEntry, CostRecord, CostReport, PackageKey};
pub use error::{ApiErrorResponse, AppError, AppResult, ErrorCode};
pub use local_storage::{FsPackageStore, PackageRecord};
pub use registry_trait::{FetchOutcome, PackageSource, PackageStore, ResolvedPackage, UnresolvedReason};
pub use resolver::DependencyResolver;
pub use server::{build_router, run_server};
pub use state::AppState;
pub use upstream::{UpstreamClient, UpstreamConfig};

/// Calculate SHA256 hash of data as a lowercase hexadecimal string.
///
/// ```
/// # use registry_server::sha256_hash;
/// let hash = sha256_hash(b"hello world");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn sha256_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Local id of a package: SHA256 of the lowercased name followed by the
/// version.
///
/// ```
/// # use registry_server::package_id;
/// assert_eq!(package_id("Express", "4.18.2"), package_id("express", "4.18.2"));
/// assert_ne!(package_id("express", "4.18.2"), package_id("express", "4.18.3"));
/// ```
pub fn package_id(name: &str, version: &str) -> String {
    sha256_hash(format!("{}{}", name.to_lowercase(), version).as_bytes())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_is_sha256_of_lowercase_name_and_version() {
        assert_eq!(package_id("Demo", "1.0.0"), sha256_hash(b"demo1.0.0"));
        assert_eq!(
            sha256_hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_padded_zip_hits_exact_size() {
        let archive = test_utils::padded_zip(r#"{"name":"x"}"#, test_utils::MIB);
        assert_eq!(archive.len(), test_utils::MIB);
        let manifest = archive::extract_manifest(
            &archive,
            archive::ArchiveFormat::Zip,
            archive::MANIFEST_FILENAME,
        )
        .unwrap()
        .unwrap();
        assert_eq!(manifest.name.as_deref(), Some("x"));
    }
}
