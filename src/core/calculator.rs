//! Financial calculator - pure interest, amortization and schedule arithmetic.
//!
//! Nothing in this module touches the database. All money values are `f64`
//! dollars kept at full precision; rounding to cents happens in
//! [`crate::core::money::to_cents`] when a value is posted to the ledger.
//!
//! Conventions:
//! - loan interest is simple interest on the original principal, actual/365;
//! - GIC interest compounds monthly over the whole term;
//! - month arithmetic is calendar based and clamps to the last day of shorter months;
//! - bi-weekly schedules fall every 14 days after the start date.

use crate::entities::PaymentFrequency;
use chrono::{Days, Months, NaiveDate};

/// Day-count denominator for simple interest.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Length of one bi-weekly period in days.
pub const BIWEEKLY_PERIOD_DAYS: u64 = 14;

/// Bi-weekly payments per year.
pub const BIWEEKLY_PERIODS_PER_YEAR: f64 = 26.0;

/// Simple interest: `principal × (rate/100) × (days/365)`.
///
/// Negative day counts yield zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn simple_interest(principal: f64, annual_rate_pct: f64, days: i64) -> f64 {
    if days <= 0 {
        return 0.0;
    }
    principal * (annual_rate_pct / 100.0) * (days as f64 / DAYS_PER_YEAR)
}

/// Standard fixed monthly payment that amortizes `principal` over `term_months`.
///
/// A zero rate spreads the principal evenly. A zero term means the whole
/// principal is due at once.
#[must_use]
pub fn monthly_amortized_payment(principal: f64, annual_rate_pct: f64, term_months: u32) -> f64 {
    if term_months == 0 {
        return principal;
    }
    let n = f64::from(term_months);
    if annual_rate_pct == 0.0 {
        return principal / n;
    }
    let i = annual_rate_pct / 100.0 / 12.0;
    principal * i / (1.0 - (1.0 + i).powf(-n))
}

/// Cash amount due per period for the given schedule, derived from the monthly
/// amortized payment. `AtMaturity` has no periodic payment.
#[must_use]
pub fn payment_by_frequency(
    principal: f64,
    annual_rate_pct: f64,
    term_months: u32,
    frequency: PaymentFrequency,
) -> Option<f64> {
    let monthly = monthly_amortized_payment(principal, annual_rate_pct, term_months);
    match frequency {
        PaymentFrequency::Monthly => Some(monthly),
        PaymentFrequency::BiWeekly => Some(monthly * 12.0 / BIWEEKLY_PERIODS_PER_YEAR),
        PaymentFrequency::Annually => Some(monthly * 12.0),
        PaymentFrequency::AtMaturity => None,
    }
}

/// `start + term_months` using calendar months.
///
/// Saturates at [`NaiveDate::MAX`] for terms beyond chrono's date range.
#[must_use]
pub fn maturity_date(start: NaiveDate, term_months: u32) -> NaiveDate {
    start
        .checked_add_months(Months::new(term_months))
        .unwrap_or(NaiveDate::MAX)
}

/// True once `today` is on or after the maturity date.
#[must_use]
pub fn has_reached_maturity(start: NaiveDate, term_months: u32, today: NaiveDate) -> bool {
    today >= maturity_date(start, term_months)
}

/// Signed number of days from `from` to `to`.
#[must_use]
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Value of a GIC at maturity: `principal × (1 + r/12)^(12 × years)`, with
/// `years = term_months / 12`.
#[must_use]
pub fn gic_maturity_value(principal: f64, annual_rate_pct: f64, term_months: u32) -> f64 {
    let monthly_rate = annual_rate_pct / 100.0 / 12.0;
    let years = f64::from(term_months) / 12.0;
    principal * (1.0 + monthly_rate).powf(12.0 * years)
}

/// The `n`-th due date after `start` (`n ≥ 1`), or `None` for `AtMaturity`
/// schedules and out-of-range dates.
#[must_use]
pub fn due_date(start: NaiveDate, frequency: PaymentFrequency, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }
    match frequency {
        PaymentFrequency::BiWeekly => {
            start.checked_add_days(Days::new(BIWEEKLY_PERIOD_DAYS * u64::from(n)))
        }
        PaymentFrequency::Monthly => start.checked_add_months(Months::new(n)),
        PaymentFrequency::Annually => start.checked_add_months(Months::new(n.checked_mul(12)?)),
        PaymentFrequency::AtMaturity => None,
    }
}

/// Most recent due date that is on or before `on`, if at least one full period
/// has elapsed since `start`.
#[must_use]
pub fn latest_due_date(
    start: NaiveDate,
    frequency: PaymentFrequency,
    on: NaiveDate,
) -> Option<NaiveDate> {
    if on <= start {
        return None;
    }
    let periods = match frequency {
        PaymentFrequency::BiWeekly => {
            let days = u64::try_from(days_between(start, on)).ok()?;
            u32::try_from(days / BIWEEKLY_PERIOD_DAYS).ok()?
        }
        PaymentFrequency::Monthly => whole_months_between(start, on)?,
        PaymentFrequency::Annually => whole_months_between(start, on)? / 12,
        PaymentFrequency::AtMaturity => return None,
    };
    due_date(start, frequency, periods)
}

/// True when `on` is exactly one of the scheduled due dates.
#[must_use]
pub fn is_due_date(start: NaiveDate, frequency: PaymentFrequency, on: NaiveDate) -> bool {
    latest_due_date(start, frequency, on) == Some(on)
}

/// Number of whole calendar months from `start` to `on` (clamped month ends count
/// as reached).
fn whole_months_between(start: NaiveDate, on: NaiveDate) -> Option<u32> {
    use chrono::Datelike;

    let raw = (on.year() - start.year()) * 12 + i32::try_from(on.month()).ok()?
        - i32::try_from(start.month()).ok()?;
    let mut months = u32::try_from(raw).ok()?;
    while months > 0 && start.checked_add_months(Months::new(months))? > on {
        months -= 1;
    }
    Some(months)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_simple_interest() {
        assert!(approx(simple_interest(1000.0, 12.0, 365), 120.0));
        assert!(approx(simple_interest(1000.0, 12.0, 30), 1000.0 * 0.12 * 30.0 / 365.0));
        assert!(approx(simple_interest(1000.0, 12.0, 0), 0.0));
        assert!(approx(simple_interest(1000.0, 12.0, -5), 0.0));
    }

    #[test]
    fn test_monthly_amortized_payment() {
        let payment = monthly_amortized_payment(1000.0, 12.0, 12);
        assert_eq!(crate::core::money::to_cents(payment), 8885);
    }

    #[test]
    fn test_monthly_amortized_payment_zero_rate() {
        assert!(approx(monthly_amortized_payment(1200.0, 0.0, 12), 100.0));
        assert!(approx(monthly_amortized_payment(1200.0, 5.0, 0), 1200.0));
    }

    #[test]
    fn test_payment_by_frequency() {
        let monthly = monthly_amortized_payment(2600.0, 6.0, 24);
        let biweekly = payment_by_frequency(2600.0, 6.0, 24, PaymentFrequency::BiWeekly).unwrap();
        let annual = payment_by_frequency(2600.0, 6.0, 24, PaymentFrequency::Annually).unwrap();

        assert!(approx(biweekly, monthly * 12.0 / 26.0));
        assert!(approx(annual, monthly * 12.0));
        assert!(payment_by_frequency(2600.0, 6.0, 24, PaymentFrequency::AtMaturity).is_none());
    }

    #[test]
    fn test_maturity_date_uses_calendar_months() {
        assert_eq!(maturity_date(date(2024, 1, 15), 12), date(2025, 1, 15));
        assert_eq!(maturity_date(date(2024, 1, 31), 1), date(2024, 2, 29));
        assert_eq!(maturity_date(date(2023, 1, 31), 1), date(2023, 2, 28));
        assert_eq!(maturity_date(date(2024, 3, 1), 0), date(2024, 3, 1));
    }

    #[test]
    fn test_has_reached_maturity() {
        let start = date(2024, 1, 15);
        assert!(!has_reached_maturity(start, 6, date(2024, 7, 14)));
        assert!(has_reached_maturity(start, 6, date(2024, 7, 15)));
        assert!(has_reached_maturity(start, 6, date(2024, 8, 1)));
    }

    #[test]
    fn test_gic_maturity_value() {
        let value = gic_maturity_value(1000.0, 12.0, 12);
        assert_eq!(crate::core::money::to_cents(value), 112_683);

        // Zero rate returns the principal.
        assert!(approx(gic_maturity_value(500.0, 0.0, 24), 500.0));
    }

    #[test]
    fn test_biweekly_schedule() {
        let start = date(2024, 1, 1);
        assert_eq!(latest_due_date(start, PaymentFrequency::BiWeekly, date(2024, 1, 14)), None);
        assert!(is_due_date(start, PaymentFrequency::BiWeekly, date(2024, 1, 15)));
        assert!(!is_due_date(start, PaymentFrequency::BiWeekly, date(2024, 1, 16)));
        assert_eq!(
            latest_due_date(start, PaymentFrequency::BiWeekly, date(2024, 2, 1)),
            Some(date(2024, 1, 29))
        );
    }

    #[test]
    fn test_monthly_schedule_clamps_month_end() {
        let start = date(2024, 1, 31);
        assert!(is_due_date(start, PaymentFrequency::Monthly, date(2024, 2, 29)));
        assert_eq!(
            latest_due_date(start, PaymentFrequency::Monthly, date(2024, 3, 30)),
            Some(date(2024, 2, 29))
        );
        assert!(is_due_date(start, PaymentFrequency::Monthly, date(2024, 3, 31)));
        assert_eq!(latest_due_date(start, PaymentFrequency::Monthly, date(2024, 2, 28)), None);
    }

    #[test]
    fn test_annual_schedule() {
        let start = date(2023, 6, 10);
        assert_eq!(latest_due_date(start, PaymentFrequency::Annually, date(2024, 6, 9)), None);
        assert!(is_due_date(start, PaymentFrequency::Annually, date(2024, 6, 10)));
        assert_eq!(
            latest_due_date(start, PaymentFrequency::Annually, date(2025, 1, 1)),
            Some(date(2024, 6, 10))
        );
    }

    #[test]
    fn test_at_maturity_has_no_due_dates() {
        let start = date(2024, 1, 1);
        assert_eq!(latest_due_date(start, PaymentFrequency::AtMaturity, date(2030, 1, 1)), None);
        assert_eq!(due_date(start, PaymentFrequency::AtMaturity, 1), None);
    }
}
