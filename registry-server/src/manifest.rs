//! Package manifest (`package.json`) model.
//!
//! Only the production `dependencies` section feeds cost resolution. Any
//! document shape other than an object with an object-valued `dependencies`
//! field yields no dependencies.

use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed package manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Dependency name to its declared constraint, verbatim apart from
    /// surrounding whitespace.
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_value(&value))
    }

    /// Build a manifest from an already decoded JSON document.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let text = |field: &str| {
            object
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        // Non-string constraints (objects, arrays, numbers) are not
        // registry-resolvable and are skipped.
        let dependencies = object
            .get("dependencies")
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, constraint)| {
                        constraint
                            .as_str()
                            .map(|c| (name.clone(), c.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: text("name"),
            version: text("version"),
            dependencies,
        }
    }
}
