//! # Input Validation: Size Limits

use crate::validation::error::{ValidationError, ValidationResult};

/// Maximum allowed archive size for ingestion (100 MB)
pub const MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum allowed base64 encoded size (140 MB), leaves room for the 4/3 expansion
pub const MAX_BASE64_ENCODED_SIZE: usize = 140 * 1024 * 1024;

/// Maximum allowed decoded base64 size (100 MB)
pub const MAX_BASE64_DECODED_SIZE: usize = 100 * 1024 * 1024;

/// Maximum allowed package name length (npm limit)
pub const MAX_PACKAGE_NAME_LENGTH: usize = 214;

/// Maximum allowed version string length
pub const MAX_VERSION_LENGTH: usize = 64;

/// Maximum allowed local package id length
pub const MAX_PACKAGE_ID_LENGTH: usize = 128;

/// Validate file size against limits.
///
/// `max_size` defaults to [`MAX_UPLOAD_SIZE`].
pub fn validate_file_size(size: u64, max_size: Option<u64>) -> ValidationResult<()> {
    let limit = max_size.unwrap_or(MAX_UPLOAD_SIZE);

    if size > limit {
        return Err(ValidationError::FileTooLarge {
            actual: size,
            max: limit,
        });
    }

    Ok(())
}
