//! Daily settlement.
//!
//! One settlement run drives the loan and GIC lifecycle managers for a single
//! calendar date. It snapshots the active loans and GICs first, then applies the
//! steps in a fixed order:
//!
//! 1. loan disbursement
//! 2. loan interest
//! 3. loan payoff check
//! 4. loan maturity
//! 5. GIC maturity
//!
//! Each account is processed on its own. A failure is logged, recorded in the
//! report and the run moves on to the next account. The run as a whole is not
//! transactional; every step is idempotent, so re-running a date is safe.
//!
//! The date of the last completed run is kept in the `system_state` table so that
//! missed days can be caught up after downtime.

use crate::{
    core::{account, gic, loan, money},
    entities::{AccountStatus, AccountType, SystemState, system_state},
    errors::{Error, Result},
};
use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{Set, prelude::*};
use std::{fmt, time::Duration};
use tracing::{error, info, instrument, warn};

const LAST_SETTLEMENT_KEY: &str = "last_settlement_date";

/// Tuning for settlement runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementOptions {
    /// A loan owing at most this many cents is paid off
    pub payoff_tolerance_cents: i64,
    /// Upper bound on the number of missed days a catch-up settles
    pub max_catch_up_days: u32,
}

impl Default for SettlementOptions {
    fn default() -> Self {
        Self {
            payoff_tolerance_cents: 1,
            max_catch_up_days: 31,
        }
    }
}

/// The steps of a settlement run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStep {
    /// Releasing loan principal
    Disbursement,
    /// Charging loan interest
    Interest,
    /// Detecting repaid loans
    Payoff,
    /// Force-settling matured loans
    LoanMaturity,
    /// Paying out matured GICs
    GicMaturity,
}

impl fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disbursement => "disbursement",
            Self::Interest => "interest",
            Self::Payoff => "payoff",
            Self::LoanMaturity => "loan maturity",
            Self::GicMaturity => "GIC maturity",
        };
        f.write_str(name)
    }
}

/// Money moved for one account during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementPosting {
    /// Loan or GIC account
    pub account_id: i64,
    /// Amount in cents
    pub amount: i64,
}

/// A step that failed for one account.
#[derive(Debug, Clone)]
pub struct SettlementFailure {
    /// Step that failed
    pub step: SettlementStep,
    /// Account being processed
    pub account_id: i64,
    /// Rendered error
    pub message: String,
    /// Whether the error indicates corrupted data
    pub invariant_violation: bool,
}

/// Everything a settlement run did.
#[derive(Debug, Clone)]
pub struct SettlementReport {
    /// Date that was settled
    pub settlement_date: NaiveDate,
    /// Active loans in the snapshot
    pub loans_considered: usize,
    /// Active GICs in the snapshot
    pub gics_considered: usize,
    /// Principal released per loan
    pub disbursed: Vec<SettlementPosting>,
    /// Interest charged per loan
    pub interest_charged: Vec<SettlementPosting>,
    /// Loans marked paid off
    pub paid_off: Vec<i64>,
    /// Amount collected per matured loan
    pub loans_matured: Vec<SettlementPosting>,
    /// Amount paid out per matured GIC
    pub gics_matured: Vec<SettlementPosting>,
    /// Per-account failures
    pub failures: Vec<SettlementFailure>,
}

impl SettlementReport {
    const fn new(settlement_date: NaiveDate, loans_considered: usize, gics_considered: usize) -> Self {
        Self {
            settlement_date,
            loans_considered,
            gics_considered,
            disbursed: Vec::new(),
            interest_charged: Vec::new(),
            paid_off: Vec::new(),
            loans_matured: Vec::new(),
            gics_matured: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when no account failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when the run changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disbursed.is_empty()
            && self.interest_charged.is_empty()
            && self.paid_off.is_empty()
            && self.loans_matured.is_empty()
            && self.gics_matured.is_empty()
    }

    fn record_failure(&mut self, step: SettlementStep, account_id: i64, err: &Error) {
        let invariant_violation = err.is_invariant_violation();
        if invariant_violation {
            error!(
                "INVARIANT VIOLATION during {} of account {} on {}: {}",
                step, account_id, self.settlement_date, err
            );
        } else {
            error!(
                "Settlement {} failed for account {} on {}: {}",
                step, account_id, self.settlement_date, err
            );
        }
        self.failures.push(SettlementFailure {
            step,
            account_id,
            message: err.to_string(),
            invariant_violation,
        });
    }
}

/// Retrieves the date of the last completed settlement run.
pub async fn get_last_settlement_date<C>(conn: &C) -> Result<Option<NaiveDate>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_SETTLEMENT_KEY))
        .one(conn)
        .await?;

    match state {
        Some(s) => NaiveDate::parse_from_str(&s.value, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| Error::invariant(format!("stored settlement date '{}' is unreadable: {e}", s.value))),
        None => Ok(None),
    }
}

/// Records `date` as settled. The marker never moves backwards, so re-running an
/// old date leaves it alone.
pub async fn set_last_settlement_date<C>(conn: &C, date: NaiveDate) -> Result<()>
where
    C: ConnectionTrait,
{
    let date_str = date.format("%Y-%m-%d").to_string();
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_SETTLEMENT_KEY))
        .one(conn)
        .await?;

    if let Some(state) = existing {
        let stored = NaiveDate::parse_from_str(&state.value, "%Y-%m-%d");
        if !matches!(stored, Ok(stored) if stored >= date) {
            let mut active_model: system_state::ActiveModel = state.into();
            active_model.value = Set(date_str);
            active_model.updated_at = Set(now);
            active_model.update(conn).await?;
        }
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(LAST_SETTLEMENT_KEY.to_string()),
            value: Set(date_str),
            updated_at: Set(now),
            ..Default::default()
        };
        new_state.insert(conn).await?;
    }

    Ok(())
}

/// Settles one calendar date.
///
/// The set of loans and GICs is fixed when the run starts; an account that changes
/// status during the run is still visited, and each lifecycle step re-reads its
/// status before acting.
#[instrument(skip(db, options))]
pub async fn run_daily_settlement(
    db: &DatabaseConnection,
    date: NaiveDate,
    options: &SettlementOptions,
) -> Result<SettlementReport> {
    let loan_ids: Vec<i64> =
        account::get_accounts_by_type_and_status(db, AccountType::Loan, AccountStatus::Active)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
    let gic_ids: Vec<i64> =
        account::get_accounts_by_type_and_status(db, AccountType::Investment, AccountStatus::Active)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();

    info!(
        "Settling {}: {} active loans, {} active GICs",
        date,
        loan_ids.len(),
        gic_ids.len()
    );
    let mut report = SettlementReport::new(date, loan_ids.len(), gic_ids.len());

    for &loan_id in &loan_ids {
        match loan::disburse(db, loan_id, date).await {
            Ok(Some(deposit)) => report.disbursed.push(SettlementPosting {
                account_id: loan_id,
                amount: deposit.amount,
            }),
            Ok(None) => {}
            Err(e) => report.record_failure(SettlementStep::Disbursement, loan_id, &e),
        }
    }

    for &loan_id in &loan_ids {
        match loan::process_interest(db, loan_id, date).await {
            Ok(Some(amount)) => report.interest_charged.push(SettlementPosting {
                account_id: loan_id,
                amount,
            }),
            Ok(None) => {}
            Err(e) => report.record_failure(SettlementStep::Interest, loan_id, &e),
        }
    }

    for &loan_id in &loan_ids {
        match loan::check_payoff(db, loan_id, date, options.payoff_tolerance_cents).await {
            Ok(true) => report.paid_off.push(loan_id),
            Ok(false) => {}
            Err(e) => report.record_failure(SettlementStep::Payoff, loan_id, &e),
        }
    }

    for &loan_id in &loan_ids {
        match loan::check_maturity(db, loan_id, date).await {
            Ok(Some(amount)) => report.loans_matured.push(SettlementPosting {
                account_id: loan_id,
                amount,
            }),
            Ok(None) => {}
            Err(e) => report.record_failure(SettlementStep::LoanMaturity, loan_id, &e),
        }
    }

    for &gic_id in &gic_ids {
        match gic::check_maturity(db, gic_id, date).await {
            Ok(Some(amount)) => report.gics_matured.push(SettlementPosting {
                account_id: gic_id,
                amount,
            }),
            Ok(None) => {}
            Err(e) => report.record_failure(SettlementStep::GicMaturity, gic_id, &e),
        }
    }

    set_last_settlement_date(db, date).await?;

    if report.is_clean() {
        info!("Settlement of {} complete", date);
    } else {
        warn!(
            "Settlement of {} complete with {} failures",
            date,
            report.failures.len()
        );
    }
    Ok(report)
}

/// Dates that still need settling, oldest first.
///
/// With no previous run only `today` is settled. Otherwise every day after `last`
/// up to `today`, limited to the most recent `max_catch_up_days` days.
#[must_use]
pub fn dates_to_settle(
    last: Option<NaiveDate>,
    today: NaiveDate,
    max_catch_up_days: u32,
) -> Vec<NaiveDate> {
    let Some(last) = last else {
        return vec![today];
    };
    if last >= today {
        return Vec::new();
    }

    let window = u64::from(max_catch_up_days.max(1)) - 1;
    let earliest_allowed = today.checked_sub_days(Days::new(window)).unwrap_or(today);
    let first_missed = last.succ_opt().unwrap_or(today);
    let start = first_missed.max(earliest_allowed);
    if start > first_missed {
        warn!(
            "Skipping settlement of {} through {}: more than {} days behind",
            first_missed,
            start.pred_opt().unwrap_or(start),
            max_catch_up_days
        );
    }

    start.iter_days().take_while(|d| *d <= today).collect()
}

/// Settles every date missed since the last run, up to and including `today`.
#[instrument(skip(db, options))]
pub async fn catch_up(
    db: &DatabaseConnection,
    today: NaiveDate,
    options: &SettlementOptions,
) -> Result<Vec<SettlementReport>> {
    let last = get_last_settlement_date(db).await?;
    let dates = dates_to_settle(last, today, options.max_catch_up_days);
    if dates.len() > 1 {
        info!("Catching up {} missed settlement days", dates.len());
    }

    let mut reports = Vec::with_capacity(dates.len());
    for date in dates {
        let report = run_daily_settlement(db, date, options).await?;
        info!("{}", format_settlement_summary(&report));
        reports.push(report);
    }
    Ok(reports)
}

/// Time left until the next local midnight after `now`.
#[must_use]
pub fn duration_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    const FALLBACK: Duration = Duration::from_secs(60 * 60);

    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return FALLBACK;
    };
    let midnight = tomorrow.and_time(NaiveTime::MIN);
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .and_then(|next| (next - now.clone()).to_std().ok())
        .unwrap_or(FALLBACK)
}

/// Runs settlement every night at local midnight. Never returns; failed runs are
/// logged and retried the next night through catch-up.
pub async fn run_scheduler(db: &DatabaseConnection, options: SettlementOptions) {
    loop {
        let wait = duration_until_next_midnight(&Local::now());
        info!("Next settlement in {} minutes", wait.as_secs() / 60);
        tokio::time::sleep(wait).await;

        let today = Local::now().date_naive();
        if let Err(e) = catch_up(db, today, &options).await {
            error!("Settlement for {} failed: {}", today, e);
        }
    }
}

/// Formats a settlement report into a human-readable summary string.
#[must_use]
pub fn format_settlement_summary(report: &SettlementReport) -> String {
    use std::fmt::Write;

    let mut summary = format!(
        "Settlement - {} - {} loans, {} GICs\n",
        report.settlement_date.format("%B %-d, %Y"),
        report.loans_considered,
        report.gics_considered
    );

    let _ = writeln!(
        summary,
        "  Disbursed: {} | Interest: {} | Paid off: {} | Loans matured: {} | GICs matured: {} | Failures: {}",
        report.disbursed.len(),
        report.interest_charged.len(),
        report.paid_off.len(),
        report.loans_matured.len(),
        report.gics_matured.len(),
        report.failures.len()
    );

    let sections = [
        ("Disbursed", &report.disbursed),
        ("Interest", &report.interest_charged),
        ("Loan closed", &report.loans_matured),
        ("GIC paid out", &report.gics_matured),
    ];
    for (label, postings) in sections {
        for posting in postings {
            let _ = writeln!(
                summary,
                "  {} - account {} | {}",
                label,
                posting.account_id,
                money::format_cents(posting.amount)
            );
        }
    }
    for loan_id in &report.paid_off {
        let _ = writeln!(summary, "  Paid off - account {loan_id}");
    }
    for failure in &report.failures {
        let _ = writeln!(
            summary,
            "  FAILED {} - account {}{}: {}",
            failure.step,
            failure.account_id,
            if failure.invariant_violation { " (invariant)" } else { "" },
            failure.message
        );
    }

    summary
}
