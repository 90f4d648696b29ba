//! Manifest extraction from package archives.
//!
//! Two formats are understood: zip (uploaded packages) and gzip-compressed
//! tar (npm tarballs). In both, the manifest is the first entry whose final
//! path component equals the manifest filename, at any depth.

use crate::manifest::Manifest;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

/// Manifest file looked up inside archives by default.
pub const MANIFEST_FILENAME: &str = "package.json";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Container format of a package archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tgz")]
    TarGz,
}

impl ArchiveFormat {
    /// Sniff the format from leading magic bytes.
    pub fn detect(buffer: &[u8]) -> Option<Self> {
        if buffer.starts_with(ZIP_MAGIC) || buffer.starts_with(ZIP_EMPTY_MAGIC) {
            Some(ArchiveFormat::Zip)
        } else if buffer.starts_with(GZIP_MAGIC) {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }

    /// File extension used when the archive is written to disk.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tgz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Failures while inspecting an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive could not be read: {0}")]
    Corrupt(String),

    #[error("manifest at {path} is not valid JSON: {source}")]
    MalformedManifest {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn corrupt(e: impl fmt::Display) -> ArchiveError {
    ArchiveError::Corrupt(e.to_string())
}

fn is_manifest_path(path: &str, manifest_filename: &str) -> bool {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .is_some_and(|name| name == manifest_filename)
}

/// Locate and parse the manifest inside `buffer`.
///
/// Returns `Ok(None)` when no manifest entry exists. For zip archives an
/// entry that fails to decode as JSON is also reported as `Ok(None)`; for
/// gzip-tar archives it is reported as [`ArchiveError::MalformedManifest`].
pub fn extract_manifest(
    buffer: &[u8],
    format: ArchiveFormat,
    manifest_filename: &str,
) -> Result<Option<Manifest>, ArchiveError> {
    match format {
        ArchiveFormat::Zip => extract_from_zip(buffer, manifest_filename),
        ArchiveFormat::TarGz => extract_from_tar_gz(buffer, manifest_filename),
    }
}

/// [`extract_manifest`] on the blocking thread pool, taking ownership of the
/// buffer so it is released as soon as the manifest is read.
pub async fn extract_manifest_owned<B>(
    buffer: B,
    format: ArchiveFormat,
    manifest_filename: String,
) -> Result<Option<Manifest>, ArchiveError>
where
    B: AsRef<[u8]> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        extract_manifest(buffer.as_ref(), format, &manifest_filename)
    })
    .await
    .map_err(corrupt)?
}

fn extract_from_zip(
    buffer: &[u8],
    manifest_filename: &str,
) -> Result<Option<Manifest>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(buffer)).map_err(corrupt)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(corrupt)?;
        if entry.is_dir() || !is_manifest_path(entry.name(), manifest_filename) {
            continue;
        }

        let path = entry.name().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(corrupt)?;

        return match Manifest::from_slice(&contents) {
            Ok(manifest) => {
                debug!(path = %path, "Found manifest in zip archive");
                Ok(Some(manifest))
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Ignoring undecodable manifest in zip archive");
                Ok(None)
            }
        };
    }

    Ok(None)
}

fn extract_from_tar_gz(
    buffer: &[u8],
    manifest_filename: &str,
) -> Result<Option<Manifest>, ArchiveError> {
    let mut archive = tar::Archive::new(GzDecoder::new(buffer));

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
        if !is_manifest_path(&path, manifest_filename) {
            continue;
        }

        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(corrupt)?;
        debug!(path = %path, "Found manifest in tarball");

        return Manifest::from_slice(&contents)
            .map(Some)
            .map_err(|source| ArchiveError::MalformedManifest { path, source });
    }

    Ok(None)
}
