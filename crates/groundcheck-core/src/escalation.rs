//! Escalation routing.
//!
//! Decides which grounding outcomes deserve a second, more deliberate
//! look. This module only classifies; producing reconciliation guidance
//! is the runtime's job.

use crate::form::FieldSpec;
use crate::policy::EscalationThresholds;
use crate::types::{GroundingOutcome, GroundingVerdict};
use crate::values;

/// Why an outcome is being escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTrigger {
    /// Documents assert conflicting values that cannot be reconciled
    /// mechanically.
    IrreconcilableContradiction,
    /// Evidence came from low-confidence extraction (noisy OCR).
    LowExtractionConfidence,
    /// Narrative field needing qualitative assessment rather than value
    /// matching.
    NarrativeAssessment,
}

/// Decide whether a grounding outcome should be escalated.
///
/// Supported verdicts with clean evidence never escalate. Contradiction
/// takes precedence over confidence, which takes precedence over
/// narrative review.
pub fn evaluate(
    outcome: &GroundingOutcome,
    field: &FieldSpec,
    thresholds: &EscalationThresholds,
) -> Option<EscalationTrigger> {
    let consulted_evidence =
        !outcome.supporting.is_empty() || !outcome.contradicting.is_empty();

    if outcome.verdict == GroundingVerdict::Contradicted
        && values::distinct_values(&outcome.candidate_values).len() >= 2
    {
        return Some(EscalationTrigger::IrreconcilableContradiction);
    }

    if consulted_evidence
        && outcome.min_extraction_confidence < thresholds.min_extraction_confidence
    {
        return Some(EscalationTrigger::LowExtractionConfidence);
    }

    if field.narrative && outcome.verdict != GroundingVerdict::Supported {
        return Some(EscalationTrigger::NarrativeAssessment);
    }

    None
}
