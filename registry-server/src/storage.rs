//! Filesystem helpers shared by the package store.

use crate::error::{AppError, AppResult};
use crate::validation::{validate_file_size, MAX_UPLOAD_SIZE};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Write `content` to `path`, creating parent directories as needed.
///
/// Content goes to a sibling temporary file first and is renamed into
/// place, so readers never observe a partially written file.
pub async fn save_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> AppResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
        debug!(parent = %parent.display(), "Created parent directory");
    }

    let content = content.as_ref();
    let staging = path.with_extension("partial");
    fs::write(&staging, content).await?;
    fs::rename(&staging, path).await?;
    info!(
        path = %path.display(),
        size = content.len(),
        "File saved successfully"
    );
    Ok(())
}

/// Read a whole file after checking it against the archive size limit.
pub async fn read_file<P: AsRef<Path>>(path: P) -> AppResult<Vec<u8>> {
    let path = path.as_ref();

    let metadata = match fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "File not found");
            return Err(AppError::NotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    validate_file_size(metadata.len(), Some(MAX_UPLOAD_SIZE)).map_err(|e| {
        AppError::InternalError(format!("Stored file {} too large: {e}", path.display()))
    })?;

    let content = fs::read(path).await?;
    debug!(path = %path.display(), size = content.len(), "File read successfully");
    Ok(content)
}
