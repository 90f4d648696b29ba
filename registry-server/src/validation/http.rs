//! # Input Validation: HTTP
//!
//! Validation helpers for bind hostnames and base64 encoded archive content.

use crate::validation::error::{ValidationError, ValidationResult};
use crate::validation::limits::{MAX_BASE64_DECODED_SIZE, MAX_BASE64_ENCODED_SIZE};
use regex::Regex;
use std::sync::OnceLock;

fn hostname_regex() -> &'static Regex {
    static HOSTNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    HOSTNAME_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
            .unwrap_or_else(|e| panic!("Failed to compile hostname regex: {}", e))
    })
}

/// Validate hostnames (RFC 1123) before binding the server.
pub fn validate_hostname(hostname: &str) -> ValidationResult<String> {
    if hostname.is_empty() {
        return Err(ValidationError::TooShort { actual: 0, min: 1 });
    }

    if hostname.len() > 253 {
        return Err(ValidationError::TooLong {
            actual: hostname.len(),
            max: 253,
        });
    }

    if hostname.contains('\0') {
        return Err(ValidationError::NullBytes);
    }

    if hostname.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ControlCharacters);
    }

    if !hostname_regex().is_match(hostname) {
        return Err(ValidationError::InvalidCharacters {
            input: hostname.to_string(),
        });
    }

    Ok(hostname.to_string())
}

/// Validate base64 encoded data size before decoding to prevent base64 bombs.
///
/// Limits default to [`MAX_BASE64_ENCODED_SIZE`] and [`MAX_BASE64_DECODED_SIZE`].
pub fn validate_base64_size(
    encoded_data: &str,
    max_encoded_size: Option<usize>,
    max_decoded_size: Option<usize>,
) -> ValidationResult<()> {
    let encoded_limit = max_encoded_size.unwrap_or(MAX_BASE64_ENCODED_SIZE);
    let decoded_limit = max_decoded_size.unwrap_or(MAX_BASE64_DECODED_SIZE);

    if encoded_data.len() > encoded_limit {
        return Err(ValidationError::FileTooLarge {
            actual: encoded_data.len() as u64,
            max: encoded_limit as u64,
        });
    }

    // base64 encodes 3 bytes as 4 characters
    let estimated_decoded_size = (encoded_data.len() * 3) / 4;
    if estimated_decoded_size > decoded_limit {
        return Err(ValidationError::FileTooLarge {
            actual: estimated_decoded_size as u64,
            max: decoded_limit as u64,
        });
    }

    Ok(())
}

/// Validate that base64 data contains only standard-alphabet characters.
pub fn validate_base64_characters(data: &str) -> ValidationResult<()> {
    if data.is_empty() {
        return Err(ValidationError::TooShort { actual: 0, min: 1 });
    }

    if !data
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(ValidationError::InvalidCharacters {
            input: "Invalid base64 characters detected".to_string(),
        });
    }

    Ok(())
}
