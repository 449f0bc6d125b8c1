//! # groundcheck-core
//!
//! Deterministic audit engine for benefits application forms.
//!
//! This crate answers, without any network access:
//! - Which fields are missing, malformed, or out of range?
//! - Do the numbers on the form agree with each other?
//! - Given grounding verdicts, what flags, risk score, and evidence
//!   coverage does the application earn?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same form, same schema, same verdicts, same
//!    report (modulo the timestamp)
//! 2. **No LLM calls**: grounding verdicts are inputs here, produced by
//!    `groundcheck-runtime`
//! 3. **Collect-all**: every finding is reported in one pass, never
//!    fail-fast
//! 4. **Severity is structural**: each flag code maps to exactly one
//!    severity, so message wording can never change what blocks
//!
//! ## Example
//!
//! ```rust,ignore
//! use groundcheck_core::{validator, FormSchema, FormState};
//!
//! let schema = FormSchema::builtin();
//! let form: FormState = [("monthly_rent", "$1,650")].into_iter().collect();
//! let flags = validator::validate(&schema, &form);
//! ```

pub mod consistency;
pub mod escalation;
pub mod form;
pub mod policy;
pub mod report;
pub mod types;
pub mod validator;
pub mod values;

// Re-export main types at crate root
pub use form::{FieldSpec, FieldType, FormSchema, SchemaError};
pub use policy::{AuditPolicy, EscalationThresholds, RiskWeights};
pub use report::ReportBuilder;
pub use types::{
    AuditReport, Chunk, Citation, DocStatus, DocType, Document, EvidenceSnippet, FieldMeta, Flag,
    FlagCode, FormState, GroundingOutcome, GroundingVerdict, ReconciliationSuggestion, Severity,
    GLOBAL_FIELD_ID,
};
