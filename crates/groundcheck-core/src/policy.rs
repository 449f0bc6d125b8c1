//! Tunable audit policy.
//!
//! Tolerances, escalation thresholds, and risk weights are explicit
//! configuration handed to the engine at construction, never ambient
//! global state, so audits stay reproducible under test.

use serde::{Deserialize, Serialize};

/// Weights for the risk score. Each blocker contributes more than each
/// warning; the sum is clamped to 0..=100. A tunable policy, not a law.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    pub blocker: u32,
    pub warning: u32,
    pub info: u32,
    /// Flat penalty applied when no document is ready at all.
    pub no_ready_docs: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            blocker: 22,
            warning: 10,
            info: 3,
            no_ready_docs: 18,
        }
    }
}

/// Thresholds for routing grounding outcomes to the escalation judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationThresholds {
    /// Snippets below this extraction confidence are treated as noisy
    /// (e.g. bad OCR) and the outcome is escalated.
    pub min_extraction_confidence: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            min_extraction_confidence: 0.4,
        }
    }
}

/// Audit policy: every tunable the deterministic checks and the
/// aggregator consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPolicy {
    /// Allowed relative deviation between the reported monthly income
    /// and the projection from pay frequency.
    pub income_tolerance: f64,

    /// Relative spread across recent pay periods above which income is
    /// considered volatile.
    pub variance_threshold: f64,

    /// How many recent pay periods the variance check looks at.
    pub variance_window: usize,

    /// Rent-to-income ratio above which an informational flag is raised.
    pub rent_to_income_ratio: f64,

    pub escalation: EscalationThresholds,

    pub risk: RiskWeights,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            income_tolerance: 0.15,
            variance_threshold: 0.35,
            variance_window: 3,
            rent_to_income_ratio: 0.8,
            escalation: EscalationThresholds::default(),
            risk: RiskWeights::default(),
        }
    }
}
