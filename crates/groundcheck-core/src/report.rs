//! Report aggregation.
//!
//! Collects flags from every pass, orders them deterministically, and
//! computes the headline numbers (severity counts, risk, evidence
//! coverage). Given the same inputs, `build` always produces the same
//! report modulo the timestamp.

use chrono::Utc;

use crate::form::FormSchema;
use crate::policy::RiskWeights;
use crate::types::{AuditReport, Flag, Severity, GLOBAL_FIELD_ID};

/// Accumulates flags and coverage facts, then builds the final report.
pub struct ReportBuilder<'a> {
    schema: &'a FormSchema,
    weights: &'a RiskWeights,
    flags: Vec<Flag>,
    any_ready_docs: bool,
    evidence_fields: usize,
    grounded_fields: usize,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(schema: &'a FormSchema, weights: &'a RiskWeights) -> Self {
        Self {
            schema,
            weights,
            flags: Vec::new(),
            any_ready_docs: false,
            evidence_fields: 0,
            grounded_fields: 0,
        }
    }

    pub fn push(&mut self, flag: Flag) {
        self.flags.push(flag);
    }

    pub fn extend(&mut self, flags: impl IntoIterator<Item = Flag>) {
        self.flags.extend(flags);
    }

    /// Whether at least one uploaded document finished ingestion.
    pub fn set_ready_docs(&mut self, any_ready: bool) {
        self.any_ready_docs = any_ready;
    }

    /// Record one evidence-required field and whether it ended up
    /// supported by a document.
    pub fn record_evidence_field(&mut self, grounded: bool) {
        self.evidence_fields += 1;
        if grounded {
            self.grounded_fields += 1;
        }
    }

    pub fn build(mut self) -> AuditReport {
        let order = self.schema.declaration_order();
        // Severity first, then the field's position in the schema.
        // Form-wide findings sort after every field; stable sort keeps
        // insertion order within a field.
        self.flags.sort_by_key(|flag| {
            let position = if flag.field_id == GLOBAL_FIELD_ID {
                usize::MAX
            } else {
                order.get(&flag.field_id).copied().unwrap_or(usize::MAX - 1)
            };
            (flag.severity.rank(), position)
        });

        let blockers = self.count(Severity::Blocker);
        let warnings = self.count(Severity::Warning);
        let infos = self.count(Severity::Info);

        let mut risk = blockers as u64 * self.weights.blocker as u64
            + warnings as u64 * self.weights.warning as u64
            + infos as u64 * self.weights.info as u64;
        if !self.any_ready_docs {
            risk += self.weights.no_ready_docs as u64;
        }
        let risk = risk.min(100) as u32;

        // A form with nothing to ground is fully covered, not uncovered.
        let coverage_pct = if self.evidence_fields == 0 {
            100
        } else {
            ((self.grounded_fields as f64 / self.evidence_fields as f64) * 100.0).round() as u32
        };

        AuditReport {
            flags: self.flags,
            blockers,
            warnings,
            infos,
            risk,
            coverage_pct,
            evaluated_at: Utc::now(),
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.flags.iter().filter(|f| f.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AuditPolicy;
    use crate::types::FlagCode;
    use proptest::prelude::*;

    fn builder<'a>(schema: &'a FormSchema, policy: &'a AuditPolicy) -> ReportBuilder<'a> {
        ReportBuilder::new(schema, &policy.risk)
    }

    #[test]
    fn test_flags_ordered_by_severity_then_schema_position() {
        let schema = FormSchema::builtin();
        let policy = AuditPolicy::default();
        let mut b = builder(&schema, &policy);
        b.set_ready_docs(true);
        b.push(Flag::new(FlagCode::RentToIncomeHigh, "monthly_rent", "m", "f"));
        b.push(Flag::new(FlagCode::UnusualValue, "household_size", "m", "f"));
        b.push(Flag::new(FlagCode::RequiredMissing, "monthly_rent", "m", "f"));
        b.push(Flag::new(FlagCode::RequiredMissing, "full_name", "m", "f"));
        let report = b.build();

        let keys: Vec<(Severity, &str)> = report
            .flags
            .iter()
            .map(|f| (f.severity, f.field_id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Severity::Blocker, "full_name"),
                (Severity::Blocker, "monthly_rent"),
                (Severity::Warning, "household_size"),
                (Severity::Info, "monthly_rent"),
            ]
        );
    }

    #[test]
    fn test_form_wide_flags_sort_last_within_severity() {
        let schema = FormSchema::builtin();
        let policy = AuditPolicy::default();
        let mut b = builder(&schema, &policy);
        b.set_ready_docs(true);
        b.push(Flag::new(
            FlagCode::EvidenceCheckUnavailable,
            GLOBAL_FIELD_ID,
            "m",
            "f",
        ));
        b.push(Flag::new(FlagCode::UnusualValue, "household_size", "m", "f"));
        let report = b.build();
        assert_eq!(report.flags[0].field_id, "household_size");
        assert_eq!(report.flags[1].field_id, GLOBAL_FIELD_ID);
    }

    #[test]
    fn test_risk_adds_no_ready_docs_penalty() {
        let schema = FormSchema::builtin();
        let policy = AuditPolicy::default();

        let mut with_docs = builder(&schema, &policy);
        with_docs.set_ready_docs(true);
        with_docs.push(Flag::new(FlagCode::RequiredMissing, "full_name", "m", "f"));
        assert_eq!(with_docs.build().risk, 22);

        let mut without_docs = builder(&schema, &policy);
        without_docs.push(Flag::new(FlagCode::RequiredMissing, "full_name", "m", "f"));
        assert_eq!(without_docs.build().risk, 22 + 18);
    }

    #[test]
    fn test_risk_clamped_to_100() {
        let schema = FormSchema::builtin();
        let policy = AuditPolicy::default();
        let mut b = builder(&schema, &policy);
        for _ in 0..10 {
            b.push(Flag::new(FlagCode::RequiredMissing, "full_name", "m", "f"));
        }
        assert_eq!(b.build().risk, 100);
    }

    #[test]
    fn test_coverage_rounds_and_handles_vacuous_case() {
        let schema = FormSchema::builtin();
        let policy = AuditPolicy::default();

        let b = builder(&schema, &policy);
        assert_eq!(b.build().coverage_pct, 100);

        let mut b = builder(&schema, &policy);
        b.record_evidence_field(true);
        b.record_evidence_field(true);
        b.record_evidence_field(false);
        assert_eq!(b.build().coverage_pct, 67);
    }

    #[test]
    fn test_counts_match_flag_list() {
        let schema = FormSchema::builtin();
        let policy = AuditPolicy::default();
        let mut b = builder(&schema, &policy);
        b.set_ready_docs(true);
        b.push(Flag::new(FlagCode::RequiredMissing, "full_name", "m", "f"));
        b.push(Flag::new(FlagCode::UnusualValue, "household_size", "m", "f"));
        b.push(Flag::new(FlagCode::RentToIncomeHigh, "monthly_rent", "m", "f"));
        let report = b.build();
        assert_eq!(report.blockers, 1);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.infos, 1);
        assert!(report.has_blockers());
    }

    proptest! {
        #[test]
        fn prop_risk_always_within_bounds(
            blockers in 0usize..20,
            warnings in 0usize..20,
            infos in 0usize..20,
            ready in proptest::bool::ANY,
        ) {
            let schema = FormSchema::builtin();
            let policy = AuditPolicy::default();
            let mut b = builder(&schema, &policy);
            b.set_ready_docs(ready);
            for _ in 0..blockers {
                b.push(Flag::new(FlagCode::RequiredMissing, "full_name", "m", "f"));
            }
            for _ in 0..warnings {
                b.push(Flag::new(FlagCode::UnusualValue, "household_size", "m", "f"));
            }
            for _ in 0..infos {
                b.push(Flag::new(FlagCode::RentToIncomeHigh, "monthly_rent", "m", "f"));
            }
            let report = b.build();
            prop_assert!(report.risk <= 100);
            prop_assert_eq!(report.blockers, blockers);
        }

        #[test]
        fn prop_coverage_always_within_bounds(grounded in proptest::collection::vec(proptest::bool::ANY, 0..30)) {
            let schema = FormSchema::builtin();
            let policy = AuditPolicy::default();
            let mut b = builder(&schema, &policy);
            b.set_ready_docs(true);
            for g in &grounded {
                b.record_evidence_field(*g);
            }
            let report = b.build();
            prop_assert!(report.coverage_pct <= 100);
            if grounded.iter().all(|g| *g) {
                prop_assert_eq!(report.coverage_pct, 100);
            }
        }
    }
}
