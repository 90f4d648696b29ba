//! # Input Validation Utilities
//!
//! Security-focused validation helpers for data entering the registry:
//! package names and versions from ingestion requests, local package ids
//! used as storage path components, bind hostnames, and base64 payloads.

pub mod error;
pub mod http;
pub mod limits;
pub mod manifests;

pub use self::{
    error::{ValidationError, ValidationResult},
    http::{validate_base64_characters, validate_base64_size, validate_hostname},
    limits::{
        validate_file_size, MAX_BASE64_DECODED_SIZE, MAX_BASE64_ENCODED_SIZE,
        MAX_PACKAGE_ID_LENGTH, MAX_PACKAGE_NAME_LENGTH, MAX_UPLOAD_SIZE, MAX_VERSION_LENGTH,
    },
    manifests::{validate_package_id, validate_package_name, validate_version},
};
