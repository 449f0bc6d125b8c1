//! Parsing and comparison of raw field values.
//!
//! Form values arrive as strings. These helpers parse the declared
//! types (money, number, date) and decide when two values are
//! materially different, which drives contradiction and
//! multiple-values detection.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MONEY_IN_TEXT: Regex =
        Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)").expect("Invalid regex");
}

/// Parse a money value. Accepts `$1,650`, `1650.00`, `$ 1,650.50`.
/// Negative amounts are rejected; money fields are non-negative.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(['$', ','], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    let amount: f64 = cleaned.parse().ok()?;
    if amount.is_finite() && amount >= 0.0 {
        Some(amount)
    } else {
        None
    }
}

/// Parse a plain numeric value.
pub fn parse_number(raw: &str) -> Option<f64> {
    let parsed: f64 = raw.trim().parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Parse a calendar date. Accepts ISO (`2024-03-15`), US (`03/15/2024`)
/// and long form (`March 15, 2024`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

/// Extract every dollar amount mentioned in a snippet of document text,
/// in order of appearance. Used by the consistency checker to compare
/// pay amounts across periods.
pub fn extract_money_amounts(text: &str) -> Vec<f64> {
    MONEY_IN_TEXT
        .captures_iter(text)
        .filter_map(|caps| parse_money(caps.get(1)?.as_str()))
        .collect()
}

/// Canonical form of a value for comparison: money collapses to a fixed
/// two-decimal rendering, everything else to lowercased trimmed text.
pub fn normalize(raw: &str) -> String {
    if let Some(amount) = parse_money(raw) {
        if raw.contains('$') || raw.contains(',') || raw.trim().parse::<f64>().is_ok() {
            return format!("{amount:.2}");
        }
    }
    raw.trim().to_lowercase()
}

/// Whether two raw values assert materially different facts.
///
/// Money values within half a percent of each other are the same fact
/// written differently ("$1,650" vs "1650.00"); text compares
/// case-insensitively after trimming.
pub fn materially_differ(a: &str, b: &str) -> bool {
    match (parse_money(a), parse_money(b)) {
        (Some(x), Some(y)) => {
            let larger = x.max(y);
            if larger == 0.0 {
                return false;
            }
            (x - y).abs() / larger > 0.005
        }
        _ => normalize(a) != normalize(b),
    }
}

/// Deduplicate a list of raw values down to materially distinct ones,
/// preserving first-seen order.
pub fn distinct_values(values: &[String]) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::new();
    for value in values {
        if value.trim().is_empty() {
            continue;
        }
        if !distinct.iter().any(|seen| !materially_differ(seen, value)) {
            distinct.push(value.clone());
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_variants() {
        assert_eq!(parse_money("$1,650"), Some(1650.0));
        assert_eq!(parse_money("1650.00"), Some(1650.0));
        assert_eq!(parse_money(" $ 2,310.75 "), Some(2310.75));
        assert_eq!(parse_money("-5"), None);
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15"), Some(expected));
        assert_eq!(parse_date("03/15/2024"), Some(expected));
        assert_eq!(parse_date("March 15, 2024"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_extract_money_amounts_in_order() {
        let text = "Gross pay: $1,215.50 for the period. YTD: $14,586.00.";
        assert_eq!(extract_money_amounts(text), vec![1215.50, 14586.00]);
    }

    #[test]
    fn test_materially_differ_money_tolerance() {
        assert!(!materially_differ("$1,650", "1650.00"));
        assert!(!materially_differ("$1,650", "$1,652"));
        assert!(materially_differ("$1,650", "$1,800"));
    }

    #[test]
    fn test_materially_differ_text() {
        assert!(!materially_differ("Jane Doe", "  jane doe "));
        assert!(materially_differ("Jane Doe", "John Doe"));
    }

    #[test]
    fn test_distinct_values_collapses_equivalents() {
        let values = vec![
            "$1,650".to_string(),
            "1650.00".to_string(),
            "$1,800".to_string(),
            "".to_string(),
        ];
        assert_eq!(distinct_values(&values), vec!["$1,650", "$1,800"]);
    }
}
