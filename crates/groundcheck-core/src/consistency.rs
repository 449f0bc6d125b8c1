//! Cross-field arithmetic consistency checks.
//!
//! Reasons only over numeric values already present in the form and
//! raw figures surfaced by the retriever; no natural-language
//! interpretation happens here.

use std::str::FromStr;

use crate::policy::AuditPolicy;
use crate::types::{Flag, FlagCode, FormState};
use crate::values;

pub const FIELD_MONTHLY_INCOME: &str = "monthly_gross_income";
pub const FIELD_PAY_FREQUENCY: &str = "pay_frequency";
pub const FIELD_GROSS_PAY: &str = "gross_pay_per_period";
pub const FIELD_VARIANCE_EXPLANATION: &str = "income_variance_explanation";
pub const FIELD_MONTHLY_RENT: &str = "monthly_rent";

/// How often the applicant is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayFrequency {
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
}

impl PayFrequency {
    /// Periods-to-month multiplier.
    pub fn monthly_multiplier(self) -> f64 {
        match self {
            PayFrequency::Weekly => 4.33,
            PayFrequency::Biweekly => 2.17,
            PayFrequency::Semimonthly => 2.0,
            PayFrequency::Monthly => 1.0,
        }
    }
}

impl FromStr for PayFrequency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(PayFrequency::Weekly),
            "biweekly" => Ok(PayFrequency::Biweekly),
            "semimonthly" => Ok(PayFrequency::Semimonthly),
            "monthly" => Ok(PayFrequency::Monthly),
            _ => Err(()),
        }
    }
}

/// Run every consistency check.
///
/// `observed_period_amounts` are per-period gross pay figures surfaced
/// by the retriever from paystub evidence, most recent last.
pub fn check(form: &FormState, observed_period_amounts: &[f64], policy: &AuditPolicy) -> Vec<Flag> {
    let mut flags = Vec::new();
    check_income_projection(form, policy, &mut flags);
    check_income_variance(form, observed_period_amounts, policy, &mut flags);
    check_rent_to_income(form, policy, &mut flags);
    flags
}

/// Reported monthly income should match the projection from per-period
/// gross pay and pay frequency, within tolerance.
fn check_income_projection(form: &FormState, policy: &AuditPolicy, flags: &mut Vec<Flag>) {
    let Some(frequency) = form
        .value(FIELD_PAY_FREQUENCY)
        .and_then(|v| PayFrequency::from_str(v).ok())
    else {
        return;
    };
    let Some(per_period) = form.value(FIELD_GROSS_PAY).and_then(values::parse_money) else {
        return;
    };
    let Some(reported) = form
        .value(FIELD_MONTHLY_INCOME)
        .and_then(values::parse_money)
    else {
        return;
    };

    let projected = per_period * frequency.monthly_multiplier();
    if projected <= 0.0 {
        return;
    }
    let deviation = (reported - projected).abs() / projected;
    if deviation > policy.income_tolerance {
        flags.push(Flag::new(
            FlagCode::IncomeProjectionMismatch,
            FIELD_MONTHLY_INCOME,
            format!(
                "Reported monthly income ${reported:.2} deviates {:.0}% from the \
                 ${projected:.2} projected from pay frequency.",
                deviation * 100.0
            ),
            "Re-check gross pay, pay frequency, and monthly income against your paystubs.",
        ));
    }
}

/// Pay amounts across recent periods should not swing wildly without an
/// explanation on file.
fn check_income_variance(
    form: &FormState,
    observed_period_amounts: &[f64],
    policy: &AuditPolicy,
    flags: &mut Vec<Flag>,
) {
    let window_start = observed_period_amounts
        .len()
        .saturating_sub(policy.variance_window.max(2));
    let window = &observed_period_amounts[window_start..];
    if window.len() < 2 {
        return;
    }

    let spread = max_pairwise_spread(window);
    if spread > policy.variance_threshold && !form.is_filled(FIELD_VARIANCE_EXPLANATION) {
        flags.push(Flag::new(
            FlagCode::HighIncomeVariance,
            FIELD_MONTHLY_INCOME,
            format!(
                "Pay amounts across recent periods vary by {:.0}%.",
                spread * 100.0
            ),
            "Explain the variance (overtime, seasonal hours) in the income variance field.",
        ));
    }
}

/// Largest pairwise relative difference within the window.
fn max_pairwise_spread(amounts: &[f64]) -> f64 {
    let mut spread: f64 = 0.0;
    for (i, a) in amounts.iter().enumerate() {
        for b in &amounts[i + 1..] {
            let smaller = a.min(*b);
            if smaller > 0.0 {
                spread = spread.max((a - b).abs() / smaller);
            }
        }
    }
    spread
}

/// High rent-to-income ratio is informational only.
fn check_rent_to_income(form: &FormState, policy: &AuditPolicy, flags: &mut Vec<Flag>) {
    let Some(rent) = form.value(FIELD_MONTHLY_RENT).and_then(values::parse_money) else {
        return;
    };
    let Some(income) = form
        .value(FIELD_MONTHLY_INCOME)
        .and_then(values::parse_money)
    else {
        return;
    };
    if income > 0.0 && rent / income > policy.rent_to_income_ratio {
        flags.push(Flag::new(
            FlagCode::RentToIncomeHigh,
            FIELD_MONTHLY_RENT,
            "Rent-to-income ratio appears high.",
            "Ensure values are correct and supported by documents.",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn form(entries: &[(&str, &str)]) -> FormState {
        entries.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn codes(flags: &[Flag]) -> Vec<FlagCode> {
        flags.iter().map(|f| f.code).collect()
    }

    #[test]
    fn test_weekly_projection_within_tolerance_is_quiet() {
        // p = 1000, weekly => projected 4330. 4200 deviates ~3%.
        let form = form(&[
            (FIELD_PAY_FREQUENCY, "weekly"),
            (FIELD_GROSS_PAY, "1000"),
            (FIELD_MONTHLY_INCOME, "4200"),
        ]);
        let flags = check(&form, &[], &AuditPolicy::default());
        assert!(!codes(&flags).contains(&FlagCode::IncomeProjectionMismatch));
    }

    #[test]
    fn test_weekly_projection_outside_tolerance_warns() {
        // projected 4330; 3000 deviates ~31% > 15%.
        let form = form(&[
            (FIELD_PAY_FREQUENCY, "weekly"),
            (FIELD_GROSS_PAY, "1000"),
            (FIELD_MONTHLY_INCOME, "3000"),
        ]);
        let flags = check(&form, &[], &AuditPolicy::default());
        let flag = flags
            .iter()
            .find(|f| f.code == FlagCode::IncomeProjectionMismatch)
            .expect("mismatch flag");
        assert_eq!(flag.severity, Severity::Warning);
        // Both figures appear in the message.
        assert!(flag.message.contains("3000"));
        assert!(flag.message.contains("4330"));
    }

    #[test]
    fn test_biweekly_and_semimonthly_multipliers() {
        assert_eq!(PayFrequency::Biweekly.monthly_multiplier(), 2.17);
        assert_eq!(PayFrequency::Semimonthly.monthly_multiplier(), 2.0);
        assert_eq!(PayFrequency::Monthly.monthly_multiplier(), 1.0);
    }

    #[test]
    fn test_projection_skipped_without_frequency() {
        let form = form(&[
            (FIELD_GROSS_PAY, "1000"),
            (FIELD_MONTHLY_INCOME, "100"),
        ]);
        let flags = check(&form, &[], &AuditPolicy::default());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_high_variance_without_explanation_warns() {
        let form = form(&[(FIELD_MONTHLY_INCOME, "3000")]);
        // 900 -> 1500 is a 66% swing.
        let flags = check(&form, &[900.0, 1500.0], &AuditPolicy::default());
        assert!(codes(&flags).contains(&FlagCode::HighIncomeVariance));
    }

    #[test]
    fn test_high_variance_with_explanation_is_quiet() {
        let form = form(&[
            (FIELD_MONTHLY_INCOME, "3000"),
            (FIELD_VARIANCE_EXPLANATION, "Seasonal overtime in December."),
        ]);
        let flags = check(&form, &[900.0, 1500.0], &AuditPolicy::default());
        assert!(!codes(&flags).contains(&FlagCode::HighIncomeVariance));
    }

    #[test]
    fn test_variance_looks_at_recent_window_only() {
        let policy = AuditPolicy::default();
        // Old outlier falls outside the 3-period window.
        let flags = check(
            &form(&[(FIELD_MONTHLY_INCOME, "3000")]),
            &[200.0, 1000.0, 1010.0, 990.0],
            &policy,
        );
        assert!(!codes(&flags).contains(&FlagCode::HighIncomeVariance));
    }

    #[test]
    fn test_single_observation_never_flags_variance() {
        let flags = check(
            &form(&[(FIELD_MONTHLY_INCOME, "3000")]),
            &[1000.0],
            &AuditPolicy::default(),
        );
        assert!(!codes(&flags).contains(&FlagCode::HighIncomeVariance));
    }

    #[test]
    fn test_rent_to_income_info_flag() {
        let form = form(&[
            (FIELD_MONTHLY_RENT, "$1,800"),
            (FIELD_MONTHLY_INCOME, "$2,000"),
        ]);
        let flags = check(&form, &[], &AuditPolicy::default());
        let flag = flags
            .iter()
            .find(|f| f.code == FlagCode::RentToIncomeHigh)
            .expect("info flag");
        assert_eq!(flag.severity, Severity::Info);
    }
}
