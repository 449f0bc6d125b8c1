//! Deterministic field validation.
//!
//! Pure function of form state and field schema: required-ness, type
//! parsing, declared ranges, and soft heuristics. Collect-all, never
//! fail-fast — the applicant must see every problem in one pass. No
//! network, no retrieval, no side effects.

use regex::Regex;

use crate::form::{FieldSpec, FieldType, FormSchema};
use crate::types::{Flag, FlagCode, FormState};
use crate::values;

/// Run the deterministic validation pass over every field.
pub fn validate(schema: &FormSchema, form: &FormState) -> Vec<Flag> {
    let mut flags = Vec::new();
    for field in &schema.fields {
        check_field(field, form, &mut flags);
    }
    flags
}

fn check_field(field: &FieldSpec, form: &FormState, flags: &mut Vec<Flag>) {
    let value = match form.value(&field.id) {
        Some(v) => v,
        None => {
            if field.required {
                flags.push(Flag::new(
                    FlagCode::RequiredMissing,
                    &field.id,
                    format!("{} is required.", field.label),
                    "Fill this field (use Suggest if evidence is available).",
                ));
            }
            return;
        }
    };

    let parsed = check_type(field, value, flags);
    if let Some(number) = parsed {
        check_range(field, number, flags);
    }
    check_pattern(field, value, flags);
    check_length(field, value, flags);
}

/// Parse the value as its declared type; returns the numeric value for
/// number/money fields so range checks can reuse it.
fn check_type(field: &FieldSpec, value: &str, flags: &mut Vec<Flag>) -> Option<f64> {
    match field.field_type {
        FieldType::Text => None,
        FieldType::Number => match values::parse_number(value) {
            Some(n) => Some(n),
            None => {
                flags.push(invalid_format(field, value, "a number"));
                None
            }
        },
        FieldType::Money => match values::parse_money(value) {
            Some(n) => Some(n),
            None => {
                flags.push(invalid_format(field, value, "a non-negative dollar amount"));
                None
            }
        },
        FieldType::Date => {
            if values::parse_date(value).is_none() {
                flags.push(invalid_format(field, value, "a calendar date"));
            }
            None
        }
        FieldType::Enum => {
            let matched = field
                .allowed_values
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(value));
            if !matched {
                flags.push(Flag::new(
                    FlagCode::InvalidFormat,
                    &field.id,
                    format!("{} must be one of: {}.", field.label, field.allowed_values.join(", ")),
                    "Pick one of the listed values.",
                ));
            }
            None
        }
    }
}

fn invalid_format(field: &FieldSpec, value: &str, expected: &str) -> Flag {
    Flag::new(
        FlagCode::InvalidFormat,
        &field.id,
        format!("{} ('{}') does not parse as {}.", field.label, value, expected),
        "Correct the value format.",
    )
}

fn check_range(field: &FieldSpec, number: f64, flags: &mut Vec<Flag>) {
    let below = field.min.is_some_and(|min| number < min);
    let above = field.max.is_some_and(|max| number > max);
    if below || above {
        let bounds = match (field.min, field.max) {
            (Some(min), Some(max)) => format!("{min} to {max}"),
            (Some(min), None) => format!("at least {min}"),
            (None, Some(max)) => format!("at most {max}"),
            (None, None) => unreachable!(),
        };
        flags.push(Flag::new(
            FlagCode::OutOfRange,
            &field.id,
            format!("{} must be {bounds} (got {number}).", field.label),
            "Enter a value inside the allowed range.",
        ));
        return;
    }

    // Soft heuristic: plausible but unusual values warn, never block.
    if field.unusual_above.is_some_and(|bound| number > bound) {
        flags.push(Flag::new(
            FlagCode::UnusualValue,
            &field.id,
            format!("{} of {number} is unusually large.", field.label),
            "Double-check this value before submitting.",
        ));
    }
}

fn check_pattern(field: &FieldSpec, value: &str, flags: &mut Vec<Flag>) {
    let Some(pattern) = &field.pattern else {
        return;
    };
    // Schema patterns are authored, not user input; a bad pattern is a
    // schema bug and surfaces as a non-match.
    let matched = Regex::new(pattern)
        .map(|re| re.is_match(value))
        .unwrap_or_else(|e| {
            tracing::warn!(field = %field.id, error = %e, "Invalid schema pattern");
            false
        });
    if !matched {
        flags.push(Flag::new(
            FlagCode::InvalidFormat,
            &field.id,
            format!("{} format looks wrong.", field.label),
            "Correct the value format.",
        ));
    }
}

fn check_length(field: &FieldSpec, value: &str, flags: &mut Vec<Flag>) {
    if let Some(min_length) = field.min_length {
        if value.chars().count() < min_length {
            flags.push(Flag::new(
                FlagCode::InsufficientDetail,
                &field.id,
                format!("{} may be too brief.", field.label),
                "Add what you need, why, and how it impacts housing access.",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn form(entries: &[(&str, &str)]) -> FormState {
        entries.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn flags_for<'a>(flags: &'a [Flag], field_id: &str) -> Vec<&'a Flag> {
        flags.iter().filter(|f| f.field_id == field_id).collect()
    }

    #[test]
    fn test_required_field_empty_yields_exactly_one_required_missing() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("monthly_rent", "  ")]));
        let rent_flags = flags_for(&flags, "monthly_rent");
        assert_eq!(rent_flags.len(), 1);
        assert_eq!(rent_flags[0].code, FlagCode::RequiredMissing);
        assert_eq!(rent_flags[0].severity, Severity::Blocker);
    }

    #[test]
    fn test_optional_field_empty_yields_nothing() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &FormState::new());
        assert!(flags_for(&flags, "employer_name").is_empty());
        assert!(flags_for(&flags, "pay_frequency").is_empty());
    }

    #[test]
    fn test_money_must_be_non_negative_decimal() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("monthly_rent", "twelve hundred")]));
        assert_eq!(
            flags_for(&flags, "monthly_rent")[0].code,
            FlagCode::InvalidFormat
        );

        let flags = validate(&schema, &form(&[("monthly_rent", "-100")]));
        assert_eq!(
            flags_for(&flags, "monthly_rent")[0].code,
            FlagCode::InvalidFormat
        );

        let flags = validate(&schema, &form(&[("monthly_rent", "$1,650")]));
        assert!(flags_for(&flags, "monthly_rent").is_empty());
    }

    #[test]
    fn test_date_must_be_calendar_date() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("dob", "1990-02-30")]));
        assert_eq!(flags_for(&flags, "dob")[0].code, FlagCode::InvalidFormat);
    }

    #[test]
    fn test_household_size_zero_is_out_of_range() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("household_size", "0")]));
        let hs = flags_for(&flags, "household_size");
        assert_eq!(hs.len(), 1);
        assert_eq!(hs[0].code, FlagCode::OutOfRange);
        assert_eq!(hs[0].severity, Severity::Blocker);
    }

    #[test]
    fn test_unusually_large_household_warns_but_does_not_block() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("household_size", "14")]));
        let hs = flags_for(&flags, "household_size");
        assert_eq!(hs.len(), 1);
        assert_eq!(hs[0].code, FlagCode::UnusualValue);
        assert_eq!(hs[0].severity, Severity::Warning);
    }

    #[test]
    fn test_duration_in_months_capped_at_twelve() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("assistance_duration_months", "18")]));
        assert_eq!(
            flags_for(&flags, "assistance_duration_months")[0].code,
            FlagCode::OutOfRange
        );
    }

    #[test]
    fn test_state_and_zip_patterns() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("state", "Cal"), ("zip", "1234")]));
        assert_eq!(flags_for(&flags, "state")[0].code, FlagCode::InvalidFormat);
        assert_eq!(flags_for(&flags, "zip")[0].code, FlagCode::InvalidFormat);

        let flags = validate(&schema, &form(&[("state", "CA"), ("zip", "94110-1234")]));
        assert!(flags_for(&flags, "state").is_empty());
        assert!(flags_for(&flags, "zip").is_empty());
    }

    #[test]
    fn test_short_narrative_warns() {
        let schema = FormSchema::builtin();
        let flags = validate(
            &schema,
            &form(&[("requested_accommodation", "Need a ramp.")]),
        );
        let acc = flags_for(&flags, "requested_accommodation");
        assert_eq!(acc.len(), 1);
        assert_eq!(acc[0].code, FlagCode::InsufficientDetail);
        assert_eq!(acc[0].severity, Severity::Warning);
    }

    #[test]
    fn test_enum_membership_is_case_insensitive() {
        let schema = FormSchema::builtin();
        let flags = validate(&schema, &form(&[("pay_frequency", "Biweekly")]));
        assert!(flags_for(&flags, "pay_frequency").is_empty());

        let flags = validate(&schema, &form(&[("pay_frequency", "fortnightly")]));
        assert_eq!(
            flags_for(&flags, "pay_frequency")[0].code,
            FlagCode::InvalidFormat
        );
    }

    #[test]
    fn test_collect_all_not_fail_fast() {
        let schema = FormSchema::builtin();
        // Multiple broken fields must all be reported in one pass.
        let flags = validate(
            &schema,
            &form(&[
                ("household_size", "0"),
                ("zip", "bad"),
                ("dob", "not a date"),
            ]),
        );
        assert!(!flags_for(&flags, "household_size").is_empty());
        assert!(!flags_for(&flags, "zip").is_empty());
        assert!(!flags_for(&flags, "dob").is_empty());
        // Required-missing findings for untouched fields are still there.
        assert!(!flags_for(&flags, "monthly_rent").is_empty());
    }
}
