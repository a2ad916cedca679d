//! Input validation for ledger writes.
//!
//! Transaction kinds resolve in three tiers: exact match → synonym lookup →
//! error with the closest suggestion. Amounts, dates, currencies and months
//! are checked before anything reaches the local store.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::model::TransactionKind;

// ── Valid value sets (O(1) lookups) ──────────────────────────

pub static VALID_KINDS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["income", "expense"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static KIND_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("spend", "expense"),
        ("spent", "expense"),
        ("spending", "expense"),
        ("cost", "expense"),
        ("payment", "expense"),
        ("purchase", "expense"),
        ("debit", "expense"),
        ("out", "expense"),
        ("salary", "income"),
        ("wage", "income"),
        ("wages", "income"),
        ("earning", "income"),
        ("earnings", "income"),
        ("revenue", "income"),
        ("credit", "income"),
        ("in", "income"),
    ]
    .into_iter()
    .collect()
});

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Normalize a transaction kind via exact match or synonym lookup.
///
/// # Errors
///
/// Returns [`Error::InvalidKind`] with a suggestion when one is close enough.
pub fn normalize_kind(input: &str) -> Result<TransactionKind> {
    let lower = input.trim().to_lowercase();

    // Tier 1: exact match
    // Tier 2: synonym lookup
    let canonical = if VALID_KINDS.contains(lower.as_str()) {
        Some(lower.as_str())
    } else {
        KIND_SYNONYMS.get(lower.as_str()).copied()
    };

    if let Some(kind) = canonical.and_then(|k| k.parse().ok()) {
        return Ok(kind);
    }

    // Tier 3: closest suggestion
    Err(Error::InvalidKind {
        value: input.to_string(),
        suggestion: find_closest_match(&lower, &VALID_KINDS, &KIND_SYNONYMS),
    })
}

/// Amounts are positive; the kind carries the direction.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for zero, negative or non-finite values.
pub fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    Ok(amount)
}

/// Forecast projections may be zero but never negative.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for negative or non-finite values.
pub fn validate_projection(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidArgument(format!(
            "{field} must be zero or more, got {value}"
        )));
    }
    Ok(value)
}

/// Validate a calendar date. `today` resolves to the local date.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] unless the input is `YYYY-MM-DD`.
pub fn validate_date(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("today") {
        return Ok(chrono::Local::now().date_naive().format("%Y-%m-%d").to_string());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| Error::InvalidArgument(format!("date must be YYYY-MM-DD, got '{input}'")))
}

/// Normalize a currency code to upper case.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] unless the code is three ASCII letters.
pub fn normalize_currency(input: &str) -> Result<String> {
    let code = input.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(code.to_ascii_uppercase());
    }
    Err(Error::InvalidArgument(format!(
        "currency must be a three-letter code such as USD, got '{input}'"
    )))
}

/// Parse a month as a 0-based index (`0`-`11`) or a name (`march`, `mar`).
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the input names no month.
pub fn parse_month(input: &str) -> Result<u32> {
    let lower = input.trim().to_lowercase();

    if let Ok(n) = lower.parse::<u32>() {
        if n <= 11 {
            return Ok(n);
        }
        return Err(Error::InvalidArgument(format!(
            "month index must be 0-11 (0 = January), got {n}"
        )));
    }

    if lower.len() >= 3 {
        if let Some(idx) = MONTHS.iter().position(|m| m.starts_with(lower.as_str())) {
            return u32::try_from(idx).map_err(|e| Error::Other(e.to_string()));
        }
    }

    Err(Error::InvalidArgument(format!(
        "unknown month '{input}'; use 0-11 or a month name"
    )))
}

/// Name of a 0-based month index.
#[must_use]
pub fn month_name(index: u32) -> &'static str {
    usize::try_from(index)
        .ok()
        .and_then(|i| MONTHS.get(i))
        .copied()
        .unwrap_or("unknown")
}

/// Trim a required text field.
///
/// # Errors
///
/// Returns [`Error::RequiredField`] when the value is blank.
pub fn required(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::RequiredField(field));
    }
    Ok(trimmed.to_string())
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            // For synonyms, show what it maps to
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row optimization
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_kind() {
        assert_eq!(normalize_kind("income").unwrap(), TransactionKind::Income);
        assert_eq!(normalize_kind(" Expense ").unwrap(), TransactionKind::Expense);
        assert_eq!(normalize_kind("spend").unwrap(), TransactionKind::Expense);
        assert_eq!(normalize_kind("salary").unwrap(), TransactionKind::Income);
    }

    #[test]
    fn test_normalize_kind_suggests_closest() {
        let err = normalize_kind("expens").unwrap_err();
        match err {
            Error::InvalidKind { value, suggestion } => {
                assert_eq!(value, "expens");
                assert_eq!(suggestion.as_deref(), Some("expense"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = normalize_kind("zzzzzzzzzz").unwrap_err();
        assert!(matches!(err, Error::InvalidKind { suggestion: None, .. }));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(12.5).is_ok());
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-3.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert!(validate_projection("projected_income", 0.0).is_ok());
        assert!(validate_projection("projected_income", -1.0).is_err());
    }

    #[test]
    fn test_validate_date() {
        assert_eq!(validate_date("2026-02-28").unwrap(), "2026-02-28");
        assert!(validate_date("2026-02-30").is_err());
        assert!(validate_date("28/02/2026").is_err());
        assert_eq!(validate_date("today").unwrap().len(), 10);
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("eur").unwrap(), "EUR");
        assert!(normalize_currency("EURO").is_err());
        assert!(normalize_currency("U$D").is_err());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("0").unwrap(), 0);
        assert_eq!(parse_month("11").unwrap(), 11);
        assert!(parse_month("12").is_err());
        assert_eq!(parse_month("March").unwrap(), 2);
        assert_eq!(parse_month("sep").unwrap(), 8);
        assert!(parse_month("ma").is_err());
        assert!(parse_month("smarch").is_err());
        assert_eq!(month_name(2), "march");
        assert_eq!(month_name(40), "unknown");
    }

    #[test]
    fn test_required() {
        assert_eq!(required("category", "  Food ").unwrap(), "Food");
        assert!(matches!(
            required("category", "   "),
            Err(Error::RequiredField("category"))
        ));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }
}
