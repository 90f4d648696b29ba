//! Package ingestion, download and reset of the local store.
//!
//! Packages arrive as a base64 encoded zip or gzip-tar archive together
//! with a name and an optional version. The package id is derived from
//! both (see [`crate::package_id`]), so re-uploading the same name and
//! version is a conflict. Downloads return the same metadata with the
//! archive base64 encoded again.

use crate::archive::ArchiveFormat;
use crate::error::{AppError, AppResult};
use crate::local_storage::{FsPackageStore, PackageRecord};
use crate::state::AppState;
use crate::validation;
use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Version assigned when an upload does not name one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// `POST /package` request body.
#[derive(Debug, Default, Deserialize)]
pub struct UploadRequest {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Version")]
    pub version: Option<String>,
    /// Base64 encoded archive
    #[serde(rename = "Content")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub metadata: PackageMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageData {
    /// Base64 encoded archive
    #[serde(rename = "Content")]
    pub content: String,
}

/// `GET /package/{id}` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub metadata: PackageMetadata,
    pub data: PackageData,
}

impl From<&PackageRecord> for PackageMetadata {
    fn from(record: &PackageRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            id: record.id.clone(),
        }
    }
}

/// Validate an archive and store it under its derived id.
///
/// # Errors
///
/// - [`AppError::BadRequest`] for an invalid name or version, or an archive
///   that is neither zip nor gzip
/// - [`AppError::UploadError`] when the archive exceeds `max_size`
/// - [`AppError::Conflict`] when the id is already stored
pub async fn ingest_archive(
    store: &FsPackageStore,
    name: &str,
    version: Option<&str>,
    archive: &[u8],
    max_size: u64,
) -> AppResult<PackageRecord> {
    let name = validation::validate_package_name(name)
        .map_err(|e| AppError::BadRequest(format!("Invalid package name: {e}")))?;
    let version = validation::validate_version(version.unwrap_or(DEFAULT_VERSION))
        .map_err(|e| AppError::BadRequest(format!("Invalid package version: {e}")))?;

    validation::validate_file_size(archive.len() as u64, Some(max_size))
        .map_err(|e| AppError::UploadError(format!("Package '{name}' too large: {e}")))?;

    let format = ArchiveFormat::detect(archive).ok_or_else(|| {
        AppError::BadRequest("Content must be a zip or gzip-compressed tar archive".to_string())
    })?;

    let id = crate::package_id(&name, &version);
    if store.exists(&id).await? {
        warn!(package = %name, version = %version, id = %id, "Package already stored");
        return Err(AppError::Conflict("Package exists already".to_string()));
    }

    let record = PackageRecord {
        id,
        name,
        version,
        format,
        size_bytes: archive.len() as u64,
        ingested_at: Utc::now(),
    };
    store.save(&record, archive).await?;
    Ok(record)
}

/// `POST /package`
pub async fn upload_package(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UploadRequest>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let (Some(name), Some(content)) = (payload.name.as_deref(), payload.content.as_deref()) else {
        warn!("Upload is missing Name or Content");
        return Err(AppError::BadRequest(
            "Missing field(s) in PackageData".to_string(),
        ));
    };
    debug!(package = %name, "Incoming package upload");

    let max_size = state.config.max_upload_size_bytes();
    validation::validate_base64_size(content, None, Some(max_size)).map_err(|e| {
        warn!(package = %name, error = %e, "Base64 size validation failed");
        AppError::UploadError(format!("Base64 data size validation failed: {e}"))
    })?;
    validation::validate_base64_characters(content).map_err(|e| {
        warn!(package = %name, error = %e, "Base64 character validation failed");
        AppError::BadRequest(format!("Invalid base64 format: {e}"))
    })?;

    let archive = general_purpose::STANDARD.decode(content)?;
    let record = ingest_archive(
        &state.store,
        name,
        payload.version.as_deref(),
        &archive,
        max_size as u64,
    )
    .await?;

    info!(
        package = %record.name,
        version = %record.version,
        id = %record.id,
        format = %record.format,
        "Package ingested"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            metadata: PackageMetadata::from(&record),
        }),
    ))
}

/// `GET /package/{id}`
pub async fn download_package(
    AxumPath(id): AxumPath<String>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<DownloadResponse>> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Missing field(s) in PackageID".to_string(),
        ));
    }
    debug!(id = %id, "Incoming package download");

    let (record, archive) = state
        .store
        .load(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Package does not exist".to_string()))?;

    info!(id = %id, package = %record.name, version = %record.version, "Serving package");
    Ok(Json(DownloadResponse {
        metadata: PackageMetadata::from(&record),
        data: PackageData {
            content: general_purpose::STANDARD.encode(archive),
        },
    }))
}

/// `DELETE /reset`
pub async fn reset_registry(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let removed = state.store.reset().await?;
    let message = if removed == 0 {
        "Registry already empty"
    } else {
        "Registry successfully reset to default state"
    };
    info!(removed, "Registry reset");
    Ok(Json(json!({ "message": message })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tgz_with_entries, zip_with_entries};
    use tempfile::TempDir;

    const LIMIT: u64 = 1024 * 1024;

    #[tokio::test]
    async fn test_ingest_defaults_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsPackageStore::new(temp_dir.path());
        let archive = zip_with_entries(&[("package.json", br#"{"name":"demo"}"#.as_slice())]);

        let record = ingest_archive(&store, "demo", None, &archive, LIMIT)
            .await
            .unwrap();

        assert_eq!(record.version, DEFAULT_VERSION);
        assert_eq!(record.id, crate::package_id("demo", "1.0.0"));
        assert_eq!(record.format, ArchiveFormat::Zip);
        assert!(store.exists(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsPackageStore::new(temp_dir.path());
        let archive = tgz_with_entries(&[("package/package.json", b"{}".as_slice())]);

        ingest_archive(&store, "demo", Some("2.0.0"), &archive, LIMIT)
            .await
            .unwrap();
        // Ids ignore name case.
        let err = ingest_archive(&store, "Demo", Some("2.0.0"), &archive, LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rejects_unknown_format_and_oversize() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsPackageStore::new(temp_dir.path());

        let err = ingest_archive(&store, "demo", None, b"plain text", LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let big = zip_with_entries(&[("blob.bin", vec![7u8; 4096].as_slice())]);
        let err = ingest_archive(&store, "demo", None, &big, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UploadError(_)));

        let err = ingest_archive(&store, "bad name", None, &big, LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
