//! Core value types shared by the deterministic engine and the runtime.
//!
//! Flags and reports are value objects: created once per audit run and
//! never mutated afterwards. Severity is a total function of the flag
//! code, so prose can never change what blocks a submission.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel field id for form-wide findings.
pub const GLOBAL_FIELD_ID: &str = "_form";

/// Severity of an audit finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocker,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank: blockers first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Blocker => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }
}

/// Fixed taxonomy of audit flag codes.
///
/// The taxonomy is closed: rules are declared per field schema, not
/// user-authored, and every code maps to exactly one severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagCode {
    RequiredMissing,
    InvalidFormat,
    OutOfRange,
    InsufficientDetail,
    UnusualValue,
    IncomeProjectionMismatch,
    HighIncomeVariance,
    MissingEvidenceRequired,
    ContradictsDocument,
    MultipleValuesFound,
    EvidenceCheckUnavailable,
    RentToIncomeHigh,
}

impl FlagCode {
    /// The severity implied by this code.
    ///
    /// `MISSING_EVIDENCE_REQUIRED` and `CONTRADICTS_DOCUMENT` are always
    /// blockers; `MULTIPLE_VALUES_FOUND` is always a warning. Encoding the
    /// mapping here makes those invariants unrepresentable to violate.
    pub fn severity(self) -> Severity {
        match self {
            FlagCode::RequiredMissing
            | FlagCode::InvalidFormat
            | FlagCode::OutOfRange
            | FlagCode::MissingEvidenceRequired
            | FlagCode::ContradictsDocument => Severity::Blocker,
            FlagCode::InsufficientDetail
            | FlagCode::UnusualValue
            | FlagCode::IncomeProjectionMismatch
            | FlagCode::HighIncomeVariance
            | FlagCode::MultipleValuesFound
            | FlagCode::EvidenceCheckUnavailable => Severity::Warning,
            FlagCode::RentToIncomeHigh => Severity::Info,
        }
    }
}

/// Reference to a specific place in a document that supports or
/// contradicts a claimed value. Purely referential: citations live only
/// on the flag or suggestion that carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    #[serde(rename = "docType")]
    pub doc_type: DocType,
    pub page: u32,
    pub chunk_id: String,
    /// Verbatim snippet from the document.
    pub quote: String,
}

/// A single audit finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub severity: Severity,
    pub code: FlagCode,
    pub field_id: String,
    pub message: String,
    /// Human-readable remediation hint.
    pub fix: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl Flag {
    /// Create a flag; severity is derived from the code.
    pub fn new(
        code: FlagCode,
        field_id: impl Into<String>,
        message: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Self {
            severity: code.severity(),
            code,
            field_id: field_id.into(),
            message: message.into(),
            fix: fix.into(),
            citations: Vec::new(),
        }
    }

    /// Attach citations (conflicting quotes for contradictions, supporting
    /// quotes otherwise).
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Document type for uploaded evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Paystub,
    Lease,
    BenefitLetter,
    ProviderLetter,
    LandlordLetter,
    UtilityBill,
    RentLedger,
    Id,
    IncomeVerification,
    Other,
}

/// Document ingestion lifecycle. Only `Ready` documents are eligible for
/// retrieval; `Error` documents are permanently excluded, never retried
/// by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    Pending,
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl DocStatus {
    pub fn is_ready(self) -> bool {
        matches!(self, DocStatus::Ready)
    }
}

/// A text segment extracted from a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub page: u32,
    pub text: String,
}

/// An ingested document. Owned by the ingestion subsystem; the engine
/// only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub doc_type: DocType,
    pub status: DocStatus,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

/// Ranked evidence returned by the retriever for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    pub doc_id: String,
    pub doc_type: DocType,
    pub filename: String,
    pub chunk_id: String,
    pub page: u32,
    pub text: String,
    /// Relevance score, higher is better.
    pub score: f64,
    /// Extraction quality signal from ingestion (noisy OCR scores low).
    pub extraction_confidence: f64,
}

impl EvidenceSnippet {
    /// Build a citation quoting this snippet.
    pub fn cite(&self, quote: impl Into<String>) -> Citation {
        Citation {
            doc_id: self.doc_id.clone(),
            doc_type: self.doc_type,
            page: self.page,
            chunk_id: self.chunk_id.clone(),
            quote: quote.into(),
        }
    }
}

/// Raw form field values supplied by the caller. The engine never
/// mutates form state; `BTreeMap` keeps iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState(pub BTreeMap<String, String>);

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed value for a field, or `None` when absent/blank.
    pub fn value(&self, field_id: &str) -> Option<&str> {
        self.0
            .get(field_id)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_filled(&self, field_id: &str) -> bool {
        self.value(field_id).is_some()
    }

    pub fn set(&mut self, field_id: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field_id.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormState {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Previously computed suggestion metadata for a field, passed back by
/// the caller so the engine can skip re-retrieval. Never trusted blindly
/// for blocker-level determinations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub confidence: f64,
}

/// Verdict of the grounding judge for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundingVerdict {
    /// At least one snippet confirms the claimed value.
    Supported,
    /// No snippet confirms or denies the claimed value.
    Unsupported,
    /// A snippet states a conflicting value.
    Contradicted,
}

/// Structured result of grounding one field against retrieved evidence.
///
/// The natural-language `reason` never influences severity; flags are
/// derived from the verdict and candidate values alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingOutcome {
    pub field_id: String,
    pub verdict: GroundingVerdict,
    pub reason: String,
    #[serde(default)]
    pub supporting: Vec<Citation>,
    #[serde(default)]
    pub contradicting: Vec<Citation>,
    /// Distinct values the evidence asserts for this field, normalized.
    #[serde(default)]
    pub candidate_values: Vec<String>,
    /// Lowest extraction confidence among consulted snippets; 1.0 when no
    /// snippets were consulted.
    #[serde(default = "default_confidence")]
    pub min_extraction_confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl GroundingOutcome {
    /// Outcome for a field with no usable evidence at all.
    pub fn no_evidence(field_id: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            verdict: GroundingVerdict::Unsupported,
            reason: "No ready document contains evidence for this field.".to_string(),
            supporting: Vec::new(),
            contradicting: Vec::new(),
            candidate_values: Vec::new(),
            min_extraction_confidence: 1.0,
        }
    }
}

/// Escalation output: reconciliation guidance for an ambiguous or
/// contradictory field. Only ever augments a flag's `fix` text; the
/// field value itself is never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSuggestion {
    pub preferred_value: String,
    pub rationale: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Clarifying question to show the applicant.
    pub clarifying_question: String,
}

/// Final audit result: one ordered flag list, severity counts, risk and
/// evidence coverage. Immutable once built; callers may persist it as an
/// opaque submission snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub flags: Vec<Flag>,
    pub blockers: usize,
    pub warnings: usize,
    pub infos: usize,
    /// Weighted risk score, clamped to 0..=100.
    pub risk: u32,
    /// Evidence-required fields with a supported verdict, as a rounded
    /// percentage. 100 when no field requires evidence.
    #[serde(rename = "coveragePct")]
    pub coverage_pct: u32,
    pub evaluated_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn has_blockers(&self) -> bool {
        self.blockers > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_is_total_function_of_code() {
        assert_eq!(
            FlagCode::MissingEvidenceRequired.severity(),
            Severity::Blocker
        );
        assert_eq!(FlagCode::ContradictsDocument.severity(), Severity::Blocker);
        assert_eq!(FlagCode::MultipleValuesFound.severity(), Severity::Warning);
        assert_eq!(
            FlagCode::EvidenceCheckUnavailable.severity(),
            Severity::Warning
        );
        assert_eq!(FlagCode::RentToIncomeHigh.severity(), Severity::Info);
    }

    #[test]
    fn test_flag_new_derives_severity() {
        let flag = Flag::new(FlagCode::RequiredMissing, "monthly_rent", "msg", "fix");
        assert_eq!(flag.severity, Severity::Blocker);
        assert_eq!(flag.field_id, "monthly_rent");
        assert!(flag.citations.is_empty());
    }

    #[test]
    fn test_flag_wire_shape() {
        let flag = Flag::new(
            FlagCode::ContradictsDocument,
            "monthly_rent",
            "Documents disagree.",
            "Check the lease.",
        );
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["severity"], "BLOCKER");
        assert_eq!(json["code"], "CONTRADICTS_DOCUMENT");
        assert_eq!(json["field_id"], "monthly_rent");
        // Empty citations are omitted from the wire shape.
        assert!(json.get("citations").is_none());
    }

    #[test]
    fn test_report_wire_shape_uses_coverage_pct_alias() {
        let report = AuditReport {
            flags: vec![],
            blockers: 0,
            warnings: 0,
            infos: 0,
            risk: 0,
            coverage_pct: 100,
            evaluated_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["coveragePct"], 100);
    }

    #[test]
    fn test_form_state_trims_and_filters_blank() {
        let mut form = FormState::new();
        form.set("a", "  hello  ");
        form.set("b", "   ");
        assert_eq!(form.value("a"), Some("hello"));
        assert_eq!(form.value("b"), None);
        assert!(!form.is_filled("missing"));
    }

    #[test]
    fn test_doc_status_ready_gate() {
        assert!(DocStatus::Ready.is_ready());
        for status in [
            DocStatus::Pending,
            DocStatus::Uploaded,
            DocStatus::Processing,
            DocStatus::Error,
        ] {
            assert!(!status.is_ready());
        }
    }
}
