//! JSON Schema validation for form schema files.
//!
//! Schema definition files are validated against spec/form.schema.json
//! before deserialization, so authors get field-level error messages
//! instead of serde's first-failure reporting.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded form schema definition (loaded at compile time).
const FORM_SCHEMA_JSON: &str = include_str!("../../../../spec/form.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema-file validation.
#[derive(Error, Debug)]
pub enum FormSchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, FormSchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(FORM_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(FormSchemaError::LoadError(e.clone())),
    }
}

/// Validate a form schema JSON value against the embedded JSON Schema.
///
/// Returns `Ok(())` if valid, or the list of validation error messages.
pub fn validate_form_schema(schema_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(schema_json)
        .map(|e| format!("{}: {}", e.instance_path, e))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
