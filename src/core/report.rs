//! Report generation business logic.
//!
//! Builds the read-only account summaries shown to clients and admins: balances,
//! recent ledger entries and, for loans and GICs, where the instrument stands.
//! All functions return structured data; formatting helpers are provided for
//! plain-text callers.

use crate::{
    core::{
        account::{self, term_of},
        calculator, gic,
        ledger::{self, BalanceFilter, TransactionQuery},
        loan, money,
    },
    entities::{AccountType, account as account_entity, transaction},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Where a loan stands on the report date.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanSummary {
    /// Amortized payment per period in cents; `None` for `AtMaturity` loans
    pub scheduled_payment: Option<i64>,
    /// End of the term
    pub maturity_date: NaiveDate,
    /// Still owed, with interest accrued to the report date
    pub outstanding: i64,
    /// Repayments and interest payments received so far
    pub paid: i64,
    /// Share of the amount due that has been paid (0-100)
    pub progress_percent: f64,
}

/// Where a GIC stands on the report date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GicSummary {
    /// End of the term
    pub maturity_date: NaiveDate,
    /// Payout at maturity in cents
    pub maturity_value: i64,
    /// Days left until maturity (0 once reached)
    pub days_to_maturity: i64,
}

/// A comprehensive report for one account.
#[derive(Debug, Clone)]
pub struct AccountReport {
    /// The account being reported on
    pub account: account_entity::Model,
    /// Balance over all entries, pending included
    pub total_balance: i64,
    /// Balance over approved entries
    pub available_balance: i64,
    /// Recent entries, newest first
    pub recent_transactions: Vec<transaction::Model>,
    /// Present for loan accounts
    pub loan: Option<LoanSummary>,
    /// Present for investment accounts
    pub gic: Option<GicSummary>,
}

/// Generates a report for an account as of `today`.
///
/// # Arguments
/// * `db` - Database connection
/// * `account_id` - ID of the account to report on
/// * `today` - Report date, used for accrued interest and days to maturity
/// * `transaction_limit` - Maximum number of recent entries to include (default 10)
pub async fn generate_account_report(
    db: &DatabaseConnection,
    account_id: i64,
    today: NaiveDate,
    transaction_limit: Option<u64>,
) -> Result<AccountReport> {
    let account = account::get_account(db, account_id).await?;

    let total_balance = ledger::get_balance(db, account_id, BalanceFilter::All).await?;
    let available_balance = ledger::get_balance(db, account_id, BalanceFilter::Approved).await?;
    let recent_transactions = ledger::get_transactions(
        db,
        account_id,
        &TransactionQuery {
            limit: Some(transaction_limit.unwrap_or(10)),
            ..Default::default()
        },
    )
    .await?;

    let loan = if account.account_type == AccountType::Loan {
        Some(loan_summary(db, &account, available_balance, today).await?)
    } else {
        None
    };
    let gic = if account.account_type == AccountType::Investment {
        Some(gic_summary(&account, today)?)
    } else {
        None
    };

    Ok(AccountReport {
        account,
        total_balance,
        available_balance,
        recent_transactions,
        loan,
        gic,
    })
}

async fn loan_summary(
    db: &DatabaseConnection,
    loan_account: &account_entity::Model,
    paid: i64,
    today: NaiveDate,
) -> Result<LoanSummary> {
    let term = term_of(loan_account)?;
    let scheduled_payment = loan_account.payment_frequency.and_then(|frequency| {
        calculator::payment_by_frequency(
            money::to_dollars(loan_account.principal),
            loan_account.interest_rate,
            term,
            frequency,
        )
        .map(money::to_cents)
    });
    let outstanding = loan::outstanding_balance(db, loan_account, today).await?;

    Ok(LoanSummary {
        scheduled_payment,
        maturity_date: calculator::maturity_date(loan_account.start_date, term),
        outstanding,
        paid,
        progress_percent: calculate_progress(paid, paid + outstanding),
    })
}

fn gic_summary(gic_account: &account_entity::Model, today: NaiveDate) -> Result<GicSummary> {
    let maturity_date = calculator::maturity_date(gic_account.start_date, term_of(gic_account)?);
    Ok(GicSummary {
        maturity_date,
        maturity_value: gic::maturity_value(gic_account)?,
        days_to_maturity: calculator::days_between(today, maturity_date).max(0),
    })
}

/// Percentage of `whole` covered by `part`. Zero when `whole` is not positive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_progress(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80%`
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress is in [0, 100] and length is small, so the result fits.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!("[{}{}] {progress_percent:.1}%", "█".repeat(filled), "░".repeat(empty))
}

/// Formats a signed cent amount like "+$50.00" or "-$25.50".
#[must_use]
pub fn format_transaction_amount(signed_cents: i64) -> String {
    if signed_cents >= 0 {
        format!("+{}", money::format_cents(signed_cents))
    } else {
        money::format_cents(signed_cents)
    }
}

/// One statement line for a ledger entry.
#[must_use]
pub fn format_transaction_summary(transaction: &transaction::Model) -> String {
    format!(
        "{} | {} | {} | {} | {}",
        transaction.date,
        format_transaction_amount(transaction.signed_amount()),
        transaction.transaction_type,
        transaction.status,
        transaction.description
    )
}
