//! Manifest schema validation
//!
//! Generic artifacts and collections have built-in manifest schemas.
//! Collection parents may additionally constrain their children through a
//! `collection_schema` in their config, validated at commit time.

use crate::types::artifact::{TYPE_COLLECTION, TYPE_GENERIC};
use crate::{Error, Result};
use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};

static GENERIC_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    jsonschema::validator_for(&json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "name": {"type": "string"},
            "description": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}},
            "authors": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                }
            },
            "license": {"type": "string"},
            "attachments": {"type": "object"},
            "files": {"type": "array"}
        },
        "required": ["name", "description"]
    }))
    .expect("built-in generic manifest schema is valid")
});

static COLLECTION_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    jsonschema::validator_for(&json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "name": {"type": "string"},
            "description": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}},
            "collection": {"type": "array"}
        },
        "required": ["name", "description"]
    }))
    .expect("built-in collection manifest schema is valid")
});

/// Validate a manifest against the built-in schema for its artifact type.
/// Free-form subtypes (e.g. `dataset`) are not constrained here.
pub fn validate_manifest(kind: &str, manifest: &JsonValue) -> Result<()> {
    let validator = match kind {
        TYPE_GENERIC => &*GENERIC_SCHEMA,
        TYPE_COLLECTION => &*COLLECTION_SCHEMA,
        _ => return Ok(()),
    };
    validator
        .validate(manifest)
        .map_err(|e| Error::Validation(format!("Manifest failed {} schema: {}", kind, e)))
}

/// Validate a child manifest against a parent collection's `collection_schema`.
pub fn validate_against_schema(manifest: &JsonValue, schema: &JsonValue) -> Result<()> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| Error::Validation(format!("Invalid collection_schema: {}", e)))?;
    validator
        .validate(manifest)
        .map_err(|e| Error::Validation(format!("ValidationError: {}", e)))
}
