//! Cents arithmetic at the ledger boundary.
//!
//! The ledger stores whole cents. Calculator results are full-precision dollars and
//! are rounded here, once, when they become a ledger amount.

/// Converts a dollar amount to whole cents, rounding half away from zero.
///
/// Non-finite input maps to zero so callers can validate the result as a
/// non-positive amount.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_cents(dollars: f64) -> i64 {
    if !dollars.is_finite() {
        return 0;
    }
    (dollars * 100.0).round() as i64
}

/// Converts cents back to dollars for the calculator.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub const fn to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Formats cents as `$1,234.56` (negative values as `-$12.00`).
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let fraction = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{fraction:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cents_rounds_half_away_from_zero() {
        assert_eq!(to_cents(0.125), 13);
        assert_eq!(to_cents(-0.125), -13);
        assert_eq!(to_cents(10.006), 1001);
        assert_eq!(to_cents(10.004), 1000);
        assert_eq!(to_cents(-2.5), -250);
        assert_eq!(to_cents(1000.0), 100_000);
    }

    #[test]
    fn test_to_cents_non_finite_is_zero() {
        assert_eq!(to_cents(f64::NAN), 0);
        assert_eq!(to_cents(f64::INFINITY), 0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_to_dollars() {
        assert_eq!(to_dollars(12_345), 123.45);
        assert_eq!(to_dollars(0), 0.0);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(100_000), "$1,000.00");
        assert_eq!(format_cents(123_456_789), "$1,234,567.89");
        assert_eq!(format_cents(-1_200), "-$12.00");
    }
}
