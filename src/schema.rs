use std::sync::OnceLock;

use jsonschema::{validator_for, Validator};
use serde_json::Value;

/// Shape every non-200 response body must have (v0, frozen).
pub const ERROR_BODY_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://saurpc.dev/schemas/error-body-v0.json",
  "title": "saurpc error body v0",
  "type": "object",
  "required": ["message"],
  "anyOf": [
    { "required": ["type"] },
    { "required": ["errorType"] }
  ],
  "properties": {
    "message": { "type": "string" },
    "type": { "type": "string", "minLength": 1 },
    "errorType": { "type": "string", "minLength": 1 },
    "data": true
  }
}"#;

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("Schema compile error: {0}")]
    SchemaCompile(String),
    #[error("Instance validation failed")]
    ValidationFailed,
}

/// Validate a JSON instance against a JSON Schema (draft 2020-12).
pub fn validate_json(schema: &Value, instance: &Value) -> Result<(), SchemaValidationError> {
    let validator =
        validator_for(schema).map_err(|e| SchemaValidationError::SchemaCompile(e.to_string()))?;
    check(&validator, instance)
}

/// Validate a response body against [`ERROR_BODY_SCHEMA`].
///
/// The schema is compiled once per process.
pub fn validate_error_body(instance: &Value) -> Result<(), SchemaValidationError> {
    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

    let validator = VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(ERROR_BODY_SCHEMA).map_err(|e| e.to_string())?;
            validator_for(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| SchemaValidationError::SchemaCompile(e.clone()))?;
    check(validator, instance)
}

fn check(validator: &Validator, instance: &Value) -> Result<(), SchemaValidationError> {
    if validator.is_valid(instance) {
        Ok(())
    } else {
        Err(SchemaValidationError::ValidationFailed)
    }
}
