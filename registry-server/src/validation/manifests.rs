//! # Input Validation: Package Identity
//!
//! Validation helpers for package names, versions and local package ids.

use crate::validation::error::{ValidationError, ValidationResult};
use crate::validation::limits::{
    MAX_PACKAGE_ID_LENGTH, MAX_PACKAGE_NAME_LENGTH, MAX_VERSION_LENGTH,
};

fn check_common(input: &str, max: usize) -> ValidationResult<()> {
    if input.is_empty() {
        return Err(ValidationError::TooShort { actual: 0, min: 1 });
    }

    if input.len() > max {
        return Err(ValidationError::TooLong {
            actual: input.len(),
            max,
        });
    }

    if input.contains('\0') {
        return Err(ValidationError::NullBytes);
    }

    if input.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ControlCharacters);
    }

    Ok(())
}

/// Validate an npm-style package name, plain (`left-pad`) or scoped
/// (`@types/node`).
///
/// Case is not restricted: ingested packages keep the name they were
/// uploaded with and ids are derived from its lowercase form.
pub fn validate_package_name(name: &str) -> ValidationResult<String> {
    check_common(name, MAX_PACKAGE_NAME_LENGTH)?;

    let bare = match name.strip_prefix('@') {
        Some(scoped) => {
            let (scope, rest) = scoped.split_once('/').ok_or_else(|| {
                ValidationError::InvalidFormat {
                    reason: "scoped package names must look like @scope/name".to_string(),
                }
            })?;
            if scope.is_empty() || rest.is_empty() || rest.contains('/') {
                return Err(ValidationError::InvalidFormat {
                    reason: "scoped package names must look like @scope/name".to_string(),
                });
            }
            vec![scope, rest]
        }
        None => vec![name],
    };

    for part in bare {
        if part.starts_with('.') || part.starts_with('_') {
            return Err(ValidationError::InvalidFormat {
                reason: "package names cannot start with . or _".to_string(),
            });
        }
        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '~'))
        {
            return Err(ValidationError::InvalidCharacters {
                input: name.to_string(),
            });
        }
    }

    Ok(name.to_string())
}

/// Validate version strings: letters, digits and `.-_+` only.
pub fn validate_version(version: &str) -> ValidationResult<String> {
    check_common(version, MAX_VERSION_LENGTH)?;

    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
    {
        return Err(ValidationError::InvalidCharacters {
            input: version.to_string(),
        });
    }

    Ok(version.to_string())
}

/// Validate a local package id. Ids become storage directory names, so
/// anything that could escape the store directory is rejected.
pub fn validate_package_id(id: &str) -> ValidationResult<String> {
    check_common(id, MAX_PACKAGE_ID_LENGTH)?;

    if id.contains("..") || id.starts_with('.') {
        return Err(ValidationError::PathTraversal {
            path: id.to_string(),
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(ValidationError::InvalidCharacters {
            input: id.to_string(),
        });
    }

    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("express").is_ok());
        assert!(validate_package_name("Left-Pad").is_ok());
        assert!(validate_package_name("@types/node").is_ok());
        assert!(validate_package_name("lodash.merge").is_ok());

        assert!(validate_package_name("").is_err());
        assert!(validate_package_name(".hidden").is_err());
        assert!(validate_package_name("@scope").is_err());
        assert!(validate_package_name("@scope/a/b").is_err());
        assert!(validate_package_name("bad name").is_err());
        assert!(validate_package_name(&"a".repeat(MAX_PACKAGE_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("1.0.0").is_ok());
        assert!(validate_version("2.0.0-beta.1+build.5").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("1.0; rm -rf /").is_err());
    }

    #[test]
    fn test_validate_package_id() {
        assert!(validate_package_id(
            "3f5a4ad39f1e7b7b4f4c3a9f1bbd2a3e2f4d6c1b0a9e8d7c6b5a4f3e2d1c0b9a"
        )
        .is_ok());
        assert!(validate_package_id("legacy_pkg-01").is_ok());

        assert!(validate_package_id("").is_err());
        assert!(validate_package_id("..").is_err());
        assert!(validate_package_id("../etc").is_err());
        assert!(validate_package_id("a/b").is_err());
        assert!(validate_package_id(".git").is_err());
    }
}
