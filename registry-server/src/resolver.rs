//! Recursive dependency cost resolution.
//!
//! The root package is loaded from the local store; every dependency is
//! resolved against the remote source. Each request gets its own
//! [`ResolutionState`]:
//!
//! - `visited` memoizes finished nodes, so a key reached through several
//!   parents is fetched once.
//! - `in_progress` holds the keys on the current path. Meeting one of them
//!   again is a cycle and aborts the whole resolution.
//!
//! Children are resolved one at a time, depth first. A dependency the
//! source cannot resolve becomes a zero-cost leaf.

use crate::archive::{extract_manifest_owned, MANIFEST_FILENAME};
use crate::cost::{size_mb, CostRecord, PackageKey};
use crate::error::{AppError, AppResult};
use crate::registry_trait::{FetchOutcome, PackageSource, PackageStore, StoredPackage};
use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info_span, warn, Instrument};

/// Per-request traversal state.
#[derive(Debug, Default)]
pub struct ResolutionState {
    visited: IndexMap<PackageKey, CostRecord>,
    in_progress: HashSet<PackageKey>,
}

/// Result of resolving a root package.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub root_key: PackageKey,
    pub root: CostRecord,
    /// Every finished node in completion order; the root comes last.
    pub visited: IndexMap<PackageKey, CostRecord>,
}

pub struct DependencyResolver<'a> {
    store: &'a dyn PackageStore,
    source: &'a dyn PackageSource,
    manifest_filename: String,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(store: &'a dyn PackageStore, source: &'a dyn PackageSource) -> Self {
        Self {
            store,
            source,
            manifest_filename: MANIFEST_FILENAME.to_string(),
        }
    }

    pub fn with_manifest_filename(mut self, manifest_filename: &str) -> Self {
        self.manifest_filename = manifest_filename.to_string();
        self
    }

    /// Resolve the full dependency graph below the stored package
    /// `local_id`.
    pub async fn resolve(&self, local_id: &str) -> AppResult<Resolution> {
        let span = info_span!("resolve_cost", root = %local_id);
        async move {
            let stored = self
                .store
                .load_by_local_id(local_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Package does not exist".to_string()))?;

            let mut state = ResolutionState::default();
            let key = PackageKey::root(local_id, stored.name.as_deref(), stored.version.as_deref());
            state.in_progress.insert(key.clone());

            let (standalone, dependencies) = self.load_root(&key, stored).await;
            let result = self.aggregate(&mut state, standalone, &dependencies).await;
            let root = finish(&mut state, key.clone(), result)?;

            debug!(
                key = %key,
                nodes = state.visited.len(),
                total_cost = root.total_cost,
                "Resolved dependency graph"
            );
            Ok(Resolution {
                root_key: key,
                root,
                visited: state.visited,
            })
        }
        .instrument(span)
        .await
    }

    /// Size the root archive and read its declared dependencies. An archive
    /// without a readable manifest has no dependencies.
    async fn load_root(
        &self,
        key: &PackageKey,
        stored: StoredPackage,
    ) -> (f64, BTreeMap<String, String>) {
        let standalone = size_mb(&stored.archive);
        let manifest =
            extract_manifest_owned(stored.archive, stored.format, self.manifest_filename.clone())
                .await;

        let dependencies = match manifest {
            Ok(Some(manifest)) => manifest.dependencies,
            Ok(None) => {
                warn!(key = %key, "Root archive has no manifest");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Root manifest unreadable");
                BTreeMap::new()
            }
        };
        (standalone, dependencies)
    }

    fn resolve_dependency<'f>(
        &'f self,
        state: &'f mut ResolutionState,
        name: &'f str,
        constraint: &'f str,
    ) -> BoxFuture<'f, AppResult<CostRecord>> {
        async move {
            let key = PackageKey::dependency(name, constraint);

            if state.in_progress.contains(&key) {
                warn!(key = %key, "Circular dependency detected");
                return Err(AppError::CircularDependency(key.into_string()));
            }
            state.in_progress.insert(key.clone());

            if let Some(record) = state.visited.get(&key).copied() {
                state.in_progress.remove(&key);
                debug!(key = %key, "Reusing resolved cost");
                return Ok(record);
            }

            let (standalone, dependencies) = match self.source.fetch(name, constraint).await {
                FetchOutcome::Resolved(package) => {
                    debug!(
                        key = %key,
                        version = %package.version,
                        standalone_cost = package.standalone_cost,
                        "Dependency resolved"
                    );
                    (package.standalone_cost, package.manifest.dependencies)
                }
                FetchOutcome::Unresolved(reason) => {
                    warn!(key = %key, reason = %reason, "Dependency unresolved, counting zero cost");
                    (0.0, BTreeMap::new())
                }
            };

            let result = self.aggregate(state, standalone, &dependencies).await;
            finish(state, key, result)
        }
        .boxed()
    }

    async fn aggregate(
        &self,
        state: &mut ResolutionState,
        standalone: f64,
        dependencies: &BTreeMap<String, String>,
    ) -> AppResult<CostRecord> {
        let mut total = standalone;
        for (name, constraint) in dependencies {
            total += self.resolve_dependency(state, name, constraint).await?.total_cost;
        }
        Ok(CostRecord {
            standalone_cost: standalone,
            total_cost: total,
        })
    }
}

/// Leave `key` and memoize its record on success.
fn finish(
    state: &mut ResolutionState,
    key: PackageKey,
    result: AppResult<CostRecord>,
) -> AppResult<CostRecord> {
    state.in_progress.remove(&key);
    let record = result?;
    state.visited.insert(key, record);
    Ok(record)
}
