//! Form schema parsing from YAML/JSON.
//!
//! A `FormSchema` is the static description of one form version: which
//! fields exist, which are required, which must be corroborated by
//! evidence, and what validation rules apply. It is loaded once per
//! form version and never changes during an audit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::DocType;

/// Errors that can occur when loading a form schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema validation failed: {0}")]
    ValidationError(String),
}

/// Declared type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Enum,
    Money,
}

/// Static description of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Unique key within the form.
    pub id: String,

    /// Human-readable label used in flag messages.
    pub label: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Whether the value must be corroborated by at least one ready
    /// document before it counts as verified.
    #[serde(default)]
    pub evidence_required: bool,

    /// Document types to consult, in priority order.
    #[serde(default)]
    pub candidate_doc_types: Vec<DocType>,

    /// Regex the raw value must match (anchored by the author).
    #[serde(default)]
    pub pattern: Option<String>,

    /// Inclusive numeric bounds; out-of-range values block submission.
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,

    /// Minimum character count for narratives; shorter values warn.
    #[serde(default)]
    pub min_length: Option<usize>,

    /// Soft upper bound; values above it warn but never block.
    #[serde(default)]
    pub unusual_above: Option<f64>,

    /// Allowed values for `enum` fields.
    #[serde(default)]
    pub allowed_values: Vec<String>,

    /// Free-prose field needing nuanced wording assessment rather than
    /// binary support-checking; routes to the escalation judge.
    #[serde(default)]
    pub narrative: bool,
}

impl FieldSpec {
    fn text(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            field_type: FieldType::Text,
            required: false,
            evidence_required: false,
            candidate_doc_types: Vec::new(),
            pattern: None,
            min: None,
            max: None,
            min_length: None,
            unusual_above: None,
            allowed_values: Vec::new(),
            narrative: false,
        }
    }

    fn typed(id: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::text(id, label)
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn evidence(mut self, doc_types: &[DocType]) -> Self {
        self.evidence_required = true;
        self.candidate_doc_types = doc_types.to_vec();
        self
    }

    fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

/// A form schema: ordered field specs plus identifying metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    /// Form version this schema describes.
    pub version: String,

    /// Human-readable name.
    pub name: String,

    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    /// Parse a schema from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let schema: FormSchema = serde_yaml::from_str(yaml)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Parse a schema from JSON, checking it against the embedded JSON
    /// Schema first for actionable error messages.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if let Err(errors) = super::validate_form_schema(&value) {
            return Err(SchemaError::ValidationError(errors.join("; ")));
        }
        let schema: FormSchema = serde_json::from_value(value)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Parse a schema from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a schema from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Structural validation beyond what serde enforces.
    fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::ValidationError(
                "schema declares no fields".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.id.is_empty() {
                return Err(SchemaError::ValidationError(
                    "field with empty id".to_string(),
                ));
            }
            if !seen.insert(&field.id) {
                return Err(SchemaError::ValidationError(format!(
                    "Duplicate field id: {}",
                    field.id
                )));
            }
            if field.field_type == FieldType::Enum && field.allowed_values.is_empty() {
                return Err(SchemaError::ValidationError(format!(
                    "enum field '{}' declares no allowed_values",
                    field.id
                )));
            }
            if field.evidence_required && field.candidate_doc_types.is_empty() {
                return Err(SchemaError::ValidationError(format!(
                    "evidence-required field '{}' declares no candidate_doc_types",
                    field.id
                )));
            }
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    return Err(SchemaError::ValidationError(format!(
                        "field '{}' has min > max",
                        field.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a field spec by id.
    pub fn field(&self, field_id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    /// Fields whose values must be corroborated by evidence.
    pub fn evidence_required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.evidence_required)
    }

    /// Map from field id to declaration position, used to keep flag
    /// ordering stable across runs.
    pub fn declaration_order(&self) -> BTreeMap<String, usize> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect()
    }

    /// The built-in benefits application form.
    pub fn builtin() -> Self {
        use DocType::*;
        use FieldType::*;

        let fields = vec![
            FieldSpec::text("full_name", "Full legal name")
                .required()
                .evidence(&[Lease, Id]),
            FieldSpec::typed("dob", "Date of birth", Date)
                .required()
                .evidence(&[Id]),
            FieldSpec::text("phone", "Phone number")
                .required()
                .pattern(r"^[+()\-. 0-9]{7,20}$"),
            FieldSpec::text("email", "Email")
                .required()
                .pattern(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"),
            FieldSpec::text("address_line1", "Street address")
                .required()
                .evidence(&[Lease, UtilityBill]),
            FieldSpec::text("city", "City")
                .required()
                .evidence(&[Lease, UtilityBill]),
            FieldSpec::text("state", "State (2-letter)")
                .required()
                .evidence(&[Lease, UtilityBill])
                .pattern(r"^[A-Za-z]{2}$"),
            FieldSpec::text("zip", "ZIP code")
                .required()
                .evidence(&[Lease, UtilityBill])
                .pattern(r"^\d{5}(-\d{4})?$"),
            {
                let mut f = FieldSpec::typed("household_size", "Household size", Number)
                    .required()
                    .range(1.0, 20.0);
                f.unusual_above = Some(10.0);
                f
            },
            FieldSpec::text("landlord_name", "Landlord name")
                .required()
                .evidence(&[Lease, LandlordLetter]),
            FieldSpec::text("landlord_contact", "Landlord contact")
                .required()
                .evidence(&[Lease, LandlordLetter]),
            FieldSpec::typed("monthly_rent", "Monthly rent (USD)", Money)
                .required()
                .evidence(&[Lease, RentLedger]),
            FieldSpec::text("employer_name", "Employer name")
                .evidence(&[Paystub, IncomeVerification]),
            FieldSpec::typed("monthly_gross_income", "Monthly gross income (USD)", Money)
                .required()
                .evidence(&[Paystub, IncomeVerification]),
            {
                let mut f =
                    FieldSpec::text("requested_accommodation", "Requested accommodation")
                        .required()
                        .evidence(&[ProviderLetter]);
                f.min_length = Some(120);
                f.narrative = true;
                f
            },
            {
                let mut f = FieldSpec::typed("pay_frequency", "Pay frequency", Enum);
                f.allowed_values = vec![
                    "weekly".to_string(),
                    "biweekly".to_string(),
                    "semimonthly".to_string(),
                    "monthly".to_string(),
                ];
                f
            },
            FieldSpec::typed("gross_pay_per_period", "Gross pay per period (USD)", Money),
            FieldSpec::text(
                "income_variance_explanation",
                "Explanation of income variance",
            ),
            FieldSpec::typed(
                "assistance_duration_months",
                "Requested assistance duration (months)",
                Number,
            )
            .range(1.0, 12.0),
        ];

        Self {
            version: "2025-06".to_string(),
            name: "Housing benefits application".to_string(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_SCHEMA: &str = r#"
version: "2025-06"
name: "Test form"
fields:
  - id: monthly_rent
    label: "Monthly rent (USD)"
    type: money
    required: true
    evidence_required: true
    candidate_doc_types: [lease, rent_ledger]
  - id: notes
    label: "Notes"
    type: text
"#;

    #[test]
    fn test_parse_valid_schema() {
        let schema = FormSchema::from_yaml(VALID_SCHEMA).unwrap();
        assert_eq!(schema.name, "Test form");
        assert_eq!(schema.fields.len(), 2);
        let rent = schema.field("monthly_rent").unwrap();
        assert!(rent.evidence_required);
        assert_eq!(rent.candidate_doc_types[0], DocType::Lease);
    }

    #[test]
    fn test_duplicate_field_ids_rejected() {
        let yaml = r#"
version: "1"
name: "Test"
fields:
  - { id: a, label: "A", type: text }
  - { id: a, label: "A again", type: text }
"#;
        let result = FormSchema::from_yaml(yaml);
        assert!(matches!(result, Err(SchemaError::ValidationError(_))));
    }

    #[test]
    fn test_enum_without_values_rejected() {
        let yaml = r#"
version: "1"
name: "Test"
fields:
  - { id: freq, label: "Frequency", type: enum }
"#;
        assert!(matches!(
            FormSchema::from_yaml(yaml),
            Err(SchemaError::ValidationError(_))
        ));
    }

    #[test]
    fn test_evidence_field_requires_doc_types() {
        let yaml = r#"
version: "1"
name: "Test"
fields:
  - { id: rent, label: "Rent", type: money, evidence_required: true }
"#;
        assert!(matches!(
            FormSchema::from_yaml(yaml),
            Err(SchemaError::ValidationError(_))
        ));
    }

    #[test]
    fn test_builtin_schema_is_valid() {
        let schema = FormSchema::builtin();
        schema.validate().unwrap();
        assert!(schema.field("monthly_rent").unwrap().evidence_required);
        assert_eq!(
            schema.field("household_size").unwrap().min,
            Some(1.0)
        );
        assert_eq!(
            schema.field("assistance_duration_months").unwrap().max,
            Some(12.0)
        );
        // Declaration order drives flag ordering.
        let order = schema.declaration_order();
        assert_eq!(order["full_name"], 0);
        assert!(order["monthly_rent"] < order["monthly_gross_income"]);
    }

    #[test]
    fn test_from_json_round_trip() {
        let schema = FormSchema::builtin();
        let json = serde_json::to_string(&schema).unwrap();
        let parsed = FormSchema::from_json(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
