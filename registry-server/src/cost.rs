//! Package cost model and the cost request boundary.
//!
//! A package's cost is the size of its archive in megabytes. The standalone
//! cost covers one archive; the total cost adds the total cost of every
//! direct dependency.

use crate::error::{AppError, AppResult};
use crate::registry_trait::{PackageSource, PackageStore};
use crate::resolver::DependencyResolver;
use crate::state::AppState;
use axum::{
    extract::{Path as AxumPath, Query, State},
    response::Json,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Bytes in one megabyte (MiB).
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Size of `buffer` in megabytes, unrounded.
pub fn size_mb(buffer: &[u8]) -> f64 {
    buffer.len() as f64 / BYTES_PER_MB
}

/// Identity of a node in the dependency graph.
///
/// Roots are keyed `name@version` when both are known and by local id
/// otherwise. Dependencies are keyed `name@constraint` with the constraint
/// exactly as declared, so two spellings of the same range are distinct
/// nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageKey(String);

impl PackageKey {
    pub fn root(local_id: &str, name: Option<&str>, version: Option<&str>) -> Self {
        match (name, version) {
            (Some(name), Some(version)) => Self(format!("{name}@{version}")),
            _ => Self(local_id.to_string()),
        }
    }

    pub fn dependency(name: &str, constraint: &str) -> Self {
        Self(format!("{name}@{constraint}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computed costs of one graph node, in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    pub standalone_cost: f64,
    pub total_cost: f64,
}

impl CostRecord {
    /// Record for a node without dependencies.
    pub fn leaf(standalone_cost: f64) -> Self {
        Self {
            standalone_cost,
            total_cost: standalone_cost,
        }
    }
}

/// One entry of a cost response. `standaloneCost` is omitted when
/// dependencies were not requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub standalone_cost: Option<f64>,
    pub total_cost: f64,
}

impl From<CostRecord> for CostEntry {
    fn from(record: CostRecord) -> Self {
        Self {
            standalone_cost: Some(record.standalone_cost),
            total_cost: record.total_cost,
        }
    }
}

/// Response body of a cost request: key to costs, root first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostReport(pub IndexMap<String, CostEntry>);

impl CostReport {
    pub fn get(&self, key: &str) -> Option<&CostEntry> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Compute the cost report for the locally stored package `local_id`.
///
/// Without dependencies only the local store is consulted and the report
/// holds the root's total cost alone. With dependencies the full graph is
/// resolved and the root entry is keyed by `local_id` rather than its
/// internal `name@version` key.
///
/// # Errors
///
/// - [`AppError::BadRequest`] when `local_id` is blank
/// - [`AppError::NotFound`] when the store has no such package
/// - [`AppError::CircularDependency`] when the graph loops
/// - [`AppError::InternalError`] for any other failure
pub async fn compute_cost(
    store: &dyn PackageStore,
    source: &dyn PackageSource,
    resolver_settings: &ResolverSettings,
    local_id: &str,
    include_dependencies: bool,
) -> AppResult<CostReport> {
    if local_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Missing field(s) in PackageID".to_string(),
        ));
    }

    let result = if include_dependencies {
        full_report(store, source, resolver_settings, local_id).await
    } else {
        standalone_report(store, local_id).await
    };

    result.map_err(|e| match e {
        AppError::BadRequest(_) | AppError::NotFound(_) | AppError::CircularDependency(_) => e,
        other => {
            error!(id = %local_id, error = %other, "Cost computation failed");
            AppError::InternalError("failed to compute package cost".to_string())
        }
    })
}

/// Resolver knobs carried from configuration into a request.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub manifest_filename: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            manifest_filename: crate::archive::MANIFEST_FILENAME.to_string(),
        }
    }
}

async fn standalone_report(store: &dyn PackageStore, local_id: &str) -> AppResult<CostReport> {
    let stored = store
        .load_by_local_id(local_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Package does not exist".to_string()))?;

    let total_cost = size_mb(&stored.archive);
    debug!(id = %local_id, total_cost, "Computed standalone cost");

    let mut entries = IndexMap::new();
    entries.insert(
        local_id.to_string(),
        CostEntry {
            standalone_cost: None,
            total_cost,
        },
    );
    Ok(CostReport(entries))
}

async fn full_report(
    store: &dyn PackageStore,
    source: &dyn PackageSource,
    resolver_settings: &ResolverSettings,
    local_id: &str,
) -> AppResult<CostReport> {
    let resolution = DependencyResolver::new(store, source)
        .with_manifest_filename(&resolver_settings.manifest_filename)
        .resolve(local_id)
        .await?;

    let mut entries = IndexMap::with_capacity(resolution.visited.len());
    entries.insert(local_id.to_string(), CostEntry::from(resolution.root));
    for (key, record) in resolution.visited {
        if key == resolution.root_key {
            continue;
        }
        entries.insert(key.into_string(), CostEntry::from(record));
    }

    info!(
        id = %local_id,
        nodes = entries.len(),
        total_cost = resolution.root.total_cost,
        "Computed dependency cost"
    );
    Ok(CostReport(entries))
}

#[derive(Debug, Deserialize)]
pub struct CostQuery {
    dependency: Option<String>,
}

impl CostQuery {
    /// Only the literal `true` enables dependency resolution.
    pub fn include_dependencies(&self) -> bool {
        self.dependency.as_deref() == Some("true")
    }
}

/// `GET /package/{id}/cost?dependency={true|false}`
pub async fn package_cost(
    AxumPath(id): AxumPath<String>,
    Query(query): Query<CostQuery>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<CostReport>> {
    let include_dependencies = query.include_dependencies();
    debug!(id = %id, include_dependencies, "Incoming cost request");

    let report = compute_cost(
        state.store.as_ref(),
        state.source.as_ref(),
        &state.resolver_settings(),
        &id,
        include_dependencies,
    )
    .await?;
    Ok(Json(report))
}
