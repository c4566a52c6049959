//! Loan lifecycle manager.
//!
//! States: `Pending → Active → {PaidOff, Closed}` and `Pending → Rejected`.
//!
//! The loan account's own ledger holds what the borrower has paid towards the
//! loan: repayments and interest payments both arrive there as deposits. What the
//! borrower still owes is therefore
//! `principal + accrued simple interest − approved loan balance`, with interest
//! accruing from the day the principal was actually paid out.
//!
//! Every step takes the settlement date as `today` and is safe to call any number
//! of times for the same date:
//! - disbursement is guarded by the `disbursed` flag;
//! - interest is guarded by the `last_interest_date` marker;
//! - payoff and maturity are guarded by compare-and-set on the status.

use crate::{
    core::{
        account::{self, NewAccount, term_of},
        calculator, ledger,
        ledger::BalanceFilter,
        money,
        transfer::{self, TransferRequest},
    },
    entities::{AccountStatus, AccountType, PaymentFrequency, TransactionType, account as account_entity, transaction},
    errors::{Error, Result},
};
use chrono::{Days, NaiveDate};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{debug, info, warn};

/// A client's request for a new loan.
#[derive(Debug, Clone)]
pub struct LoanRequest {
    /// Principal in cents
    pub amount: i64,
    /// Annual interest rate in percent
    pub interest_rate: f64,
    /// Term in months
    pub term_months: u32,
    /// Day the funds are released; must not be in the past
    pub start_date: NaiveDate,
    /// Interest schedule
    pub payment_frequency: PaymentFrequency,
    /// Free text shown on reports
    pub description: String,
}

/// Records a loan request as a `Pending` loan account.
///
/// The borrower's chequing account is created if it does not exist yet, since it
/// receives the disbursement and pays the interest.
pub async fn create_loan_request(
    db: &DatabaseConnection,
    user_id: i64,
    request: LoanRequest,
    today: NaiveDate,
) -> Result<account_entity::Model> {
    if request.amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: request.amount,
        });
    }
    if !request.interest_rate.is_finite() || request.interest_rate < 0.0 {
        return Err(Error::validation(format!(
            "invalid interest rate {}",
            request.interest_rate
        )));
    }
    if request.term_months == 0 {
        return Err(Error::validation("loan term must be at least one month"));
    }
    let term_months = i32::try_from(request.term_months)
        .map_err(|_| Error::validation(format!("loan term {} is too long", request.term_months)))?;
    if request.start_date < today {
        return Err(Error::validation(format!(
            "start date {} is before today ({today})",
            request.start_date
        )));
    }

    account::get_or_create_chequing(db, user_id).await?;

    let description = if request.description.trim().is_empty() {
        "Loan".to_string()
    } else {
        request.description.trim().to_string()
    };

    let loan = account::create_account(
        db,
        user_id,
        NewAccount {
            account_type: AccountType::Loan,
            status: AccountStatus::Pending,
            principal: request.amount,
            interest_rate: request.interest_rate,
            term_months,
            start_date: request.start_date,
            payment_frequency: Some(request.payment_frequency),
            description,
            gic_product_id: None,
        },
    )
    .await?;

    info!(
        "User {} requested loan {} of {} at {}% for {} months starting {}",
        user_id,
        loan.id,
        money::format_cents(loan.principal),
        loan.interest_rate,
        loan.term_months,
        loan.start_date
    );
    Ok(loan)
}

/// Admin approval: `Pending → Active`. No funds move until disbursement.
pub async fn approve_loan(db: &DatabaseConnection, loan_id: i64) -> Result<account_entity::Model> {
    let loan = transition(db, loan_id, AccountStatus::Pending, AccountStatus::Active).await?;
    info!("Approved loan {}", loan_id);
    Ok(loan)
}

/// Admin denial: `Pending → Rejected`.
pub async fn deny_loan(db: &DatabaseConnection, loan_id: i64) -> Result<account_entity::Model> {
    let loan = transition(db, loan_id, AccountStatus::Pending, AccountStatus::Rejected).await?;
    info!("Denied loan {}", loan_id);
    Ok(loan)
}

async fn transition<C>(
    conn: &C,
    loan_id: i64,
    from: AccountStatus,
    to: AccountStatus,
) -> Result<account_entity::Model>
where
    C: ConnectionTrait,
{
    let loan = get_loan(conn, loan_id).await?;
    if loan.status != from || !account::compare_and_set_status(conn, loan_id, from, to).await? {
        let current = account::get_account(conn, loan_id).await?;
        return Err(Error::InvalidTransition {
            account_id: loan_id,
            from: current.status,
            to,
        });
    }
    account::get_account(conn, loan_id).await
}

/// Loads an account and checks that it is a loan.
pub async fn get_loan<C>(conn: &C, loan_id: i64) -> Result<account_entity::Model>
where
    C: ConnectionTrait,
{
    let loan = account::get_account(conn, loan_id).await?;
    if !loan.is_loan() {
        return Err(Error::validation(format!(
            "account {loan_id} is a {} account, not a loan",
            loan.account_type
        )));
    }
    Ok(loan)
}

/// Releases the principal into the borrower's chequing account.
///
/// Fires only for active loans whose start date has been reached and that have
/// not been disbursed. Returns the deposit, or `None` when nothing was due.
pub async fn disburse(
    db: &DatabaseConnection,
    loan_id: i64,
    today: NaiveDate,
) -> Result<Option<transaction::Model>> {
    let loan = get_loan(db, loan_id).await?;
    if loan.status != AccountStatus::Active || loan.disbursed || today < loan.start_date {
        return Ok(None);
    }
    if loan.principal <= 0 {
        return Err(Error::invariant(format!(
            "loan {loan_id} has non-positive principal {}",
            loan.principal
        )));
    }
    let chequing = borrower_chequing(db, &loan).await?;

    let txn = db.begin().await?;
    if !account::mark_disbursed(&txn, loan_id, today).await? {
        debug!("Loan {} was disbursed concurrently", loan_id);
        return Ok(None);
    }
    let deposit = transfer::create_system_transaction(
        &txn,
        chequing.id,
        TransactionType::Deposit,
        loan.principal,
        today,
        format!("Loan {loan_id} disbursement"),
    )
    .await?;
    txn.commit().await?;

    info!(
        "Disbursed loan {}: {} into chequing account {}",
        loan_id,
        money::format_cents(loan.principal),
        chequing.id
    );
    Ok(Some(deposit))
}

/// Charges the interest for every due date reached since the last charge.
///
/// The interest is moved from the borrower's chequing account to the loan account
/// even if chequing goes negative. A loan whose schedule was missed for several
/// periods is caught up in one posting. Returns the amount charged, or `None` when
/// no due date was reached.
pub async fn process_interest(
    db: &DatabaseConnection,
    loan_id: i64,
    today: NaiveDate,
) -> Result<Option<i64>> {
    let loan = get_loan(db, loan_id).await?;
    if loan.status != AccountStatus::Active || !loan.disbursed {
        return Ok(None);
    }
    let frequency = schedule_of(&loan)?;
    if frequency == PaymentFrequency::AtMaturity {
        return Ok(None);
    }

    // Interest stops accruing at maturity; the maturity settlement takes the rest.
    let maturity = calculator::maturity_date(loan.start_date, term_of(&loan)?);
    let Some(due) = calculator::latest_due_date(loan.start_date, frequency, today.min(maturity))
    else {
        return Ok(None);
    };
    let since = loan.last_interest_date.unwrap_or_else(|| accrual_start(&loan));
    if due <= since {
        return Ok(None);
    }

    // Charged as the difference of rounded cumulative accruals, so the postings
    // always add up to the accrual used by payoff and maturity.
    let days = calculator::days_between(since, due);
    let interest = accrued_interest(&loan, due) - accrued_interest(&loan, since);
    let chequing = borrower_chequing(db, &loan).await?;

    let txn = db.begin().await?;
    if !account::advance_interest_marker(&txn, loan_id, loan.last_interest_date, due).await? {
        debug!("Interest for loan {} was processed concurrently", loan_id);
        return Ok(None);
    }
    if interest > 0 {
        let request = TransferRequest::new(chequing.id, loan_id, interest, today).with_descriptions(
            format!("Loan {loan_id} interest {since} to {due}"),
            format!("Interest payment {since} to {due}"),
        );
        transfer::execute_transfer(&txn, request).await?;
    }
    txn.commit().await?;

    info!(
        "Charged {} interest on loan {} for {} days ending {}",
        money::format_cents(interest),
        loan_id,
        days,
        due
    );
    Ok(Some(interest))
}

/// What the borrower still owes as of `as_of`, in cents.
///
/// `principal + round(simple interest disbursement→as_of) − approved loan balance`,
/// with accrual capped at the maturity date. Negative when overpaid.
pub async fn outstanding_balance<C>(
    conn: &C,
    loan: &account_entity::Model,
    as_of: NaiveDate,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let maturity = calculator::maturity_date(loan.start_date, term_of(loan)?);
    let accrued = accrued_interest(loan, as_of.min(maturity));
    let paid = ledger::get_balance(conn, loan.id, BalanceFilter::Approved).await?;
    Ok(loan.principal + accrued - paid)
}

/// First day of accrual: the disbursement date, or the start date for a loan
/// that has not been paid out yet.
fn accrual_start(loan: &account_entity::Model) -> NaiveDate {
    loan.disbursed_on
        .map_or(loan.start_date, |paid_out| paid_out.max(loan.start_date))
}

/// Simple interest on the principal from [`accrual_start`] to `as_of`, in cents.
fn accrued_interest(loan: &account_entity::Model, as_of: NaiveDate) -> i64 {
    let days = calculator::days_between(accrual_start(loan), as_of).max(0);
    money::to_cents(calculator::simple_interest(
        money::to_dollars(loan.principal),
        loan.interest_rate,
        days,
    ))
}

/// Marks the loan `PaidOff` when what is owed is within `tolerance_cents`.
///
/// Interest is counted to yesterday, but never to less than the last due date
/// already charged: that charge sits in the loan's balance and must be matched
/// on the owed side. Returns whether the loan was paid off by this call.
pub async fn check_payoff(
    db: &DatabaseConnection,
    loan_id: i64,
    today: NaiveDate,
    tolerance_cents: i64,
) -> Result<bool> {
    let loan = get_loan(db, loan_id).await?;
    if loan.status != AccountStatus::Active || !loan.disbursed {
        return Ok(false);
    }

    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let as_of = loan
        .last_interest_date
        .map_or(yesterday, |charged_to| charged_to.max(yesterday));
    let owed = outstanding_balance(db, &loan, as_of).await?;
    if owed > tolerance_cents {
        return Ok(false);
    }

    let paid_off =
        account::compare_and_set_status(db, loan_id, AccountStatus::Active, AccountStatus::PaidOff)
            .await?;
    if paid_off {
        if owed < 0 {
            warn!(
                "Loan {} paid off with an overpayment of {}",
                loan_id,
                money::format_cents(-owed)
            );
        }
        info!("Loan {} paid off (remaining {})", loan_id, money::format_cents(owed));
    }
    Ok(paid_off)
}

/// Force-settles a loan that reached its maturity date.
///
/// Whatever is owed with interest accrued to the maturity date is moved from the
/// borrower's chequing account to the loan (chequing may go negative) and the loan
/// is `Closed`, both in one storage transaction. Returns the amount collected, or
/// `None` when the loan is not active or not yet mature.
pub async fn check_maturity(
    db: &DatabaseConnection,
    loan_id: i64,
    today: NaiveDate,
) -> Result<Option<i64>> {
    let loan = get_loan(db, loan_id).await?;
    if loan.status != AccountStatus::Active {
        return Ok(None);
    }
    let term = term_of(&loan)?;
    if !calculator::has_reached_maturity(loan.start_date, term, today) {
        return Ok(None);
    }
    if !loan.disbursed {
        return Err(Error::invariant(format!(
            "loan {loan_id} reached maturity without being disbursed"
        )));
    }

    let maturity = calculator::maturity_date(loan.start_date, term);
    let owed = outstanding_balance(db, &loan, maturity).await?;
    let chequing = borrower_chequing(db, &loan).await?;

    let txn = db.begin().await?;
    if !account::compare_and_set_status(&txn, loan_id, AccountStatus::Active, AccountStatus::Closed)
        .await?
    {
        debug!("Loan {} was settled concurrently", loan_id);
        return Ok(None);
    }
    if owed > 0 {
        let request = TransferRequest::new(chequing.id, loan_id, owed, today).with_descriptions(
            format!("Loan {loan_id} final settlement"),
            "Final settlement at maturity",
        );
        transfer::execute_transfer(&txn, request).await?;
    }
    txn.commit().await?;

    let collected = owed.max(0);
    info!(
        "Loan {} matured on {} and was closed; collected {}",
        loan_id,
        maturity,
        money::format_cents(collected)
    );
    Ok(Some(collected))
}

async fn borrower_chequing<C>(conn: &C, loan: &account_entity::Model) -> Result<account_entity::Model>
where
    C: ConnectionTrait,
{
    account::find_chequing(conn, loan.user_id)
        .await?
        .ok_or_else(|| {
            Error::invariant(format!(
                "user {} has loan {} but no chequing account",
                loan.user_id, loan.id
            ))
        })
}

fn schedule_of(loan: &account_entity::Model) -> Result<PaymentFrequency> {
    loan.payment_frequency.ok_or_else(|| {
        Error::invariant(format!("loan {} has no payment frequency", loan.id))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::{TransactionQuery, get_balance, get_transactions};
    use crate::test_utils::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(amount: i64, frequency: PaymentFrequency, start_date: NaiveDate) -> LoanRequest {
        LoanRequest {
            amount,
            interest_rate: 12.0,
            term_months: 12,
            start_date,
            payment_frequency: frequency,
            description: "Car".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_loan_request() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;

        let loan = create_loan_request(
            &db,
            user.id,
            request(100_000, PaymentFrequency::Monthly, test_date()),
            test_date(),
        )
        .await?;

        assert_eq!(loan.status, AccountStatus::Pending);
        assert_eq!(loan.account_type, AccountType::Loan);
        assert_eq!(loan.principal, 100_000);
        assert!(!loan.disbursed);
        // The borrower's chequing account now exists.
        assert!(account::find_chequing(&db, user.id).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_loan_request_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let today = test_date();

        let past = create_loan_request(
            &db,
            user.id,
            request(100_000, PaymentFrequency::Monthly, date(2024, 1, 14)),
            today,
        )
        .await;
        assert!(matches!(past, Err(Error::Validation { .. })));

        let zero = create_loan_request(
            &db,
            user.id,
            request(0, PaymentFrequency::Monthly, today),
            today,
        )
        .await;
        assert!(matches!(zero, Err(Error::InvalidAmount { amount: 0 })));

        let mut no_term = request(100_000, PaymentFrequency::Monthly, today);
        no_term.term_months = 0;
        let no_term = create_loan_request(&db, user.id, no_term, today).await;
        assert!(matches!(no_term, Err(Error::Validation { .. })));

        let mut bad_rate = request(100_000, PaymentFrequency::Monthly, today);
        bad_rate.interest_rate = f64::NAN;
        let bad_rate = create_loan_request(&db, user.id, bad_rate, today).await;
        assert!(matches!(bad_rate, Err(Error::Validation { .. })));

        assert!(account::get_user_loans(&db, user.id, None).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_approve_and_deny_transitions() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let first = create_loan_request(
            &db,
            user.id,
            request(50_000, PaymentFrequency::Monthly, test_date()),
            test_date(),
        )
        .await?;
        let second = create_loan_request(
            &db,
            user.id,
            request(50_000, PaymentFrequency::Monthly, test_date()),
            test_date(),
        )
        .await?;

        assert_eq!(approve_loan(&db, first.id).await?.status, AccountStatus::Active);
        assert_eq!(deny_loan(&db, second.id).await?.status, AccountStatus::Rejected);

        let again = approve_loan(&db, first.id).await;
        assert!(matches!(
            again,
            Err(Error::InvalidTransition {
                from: AccountStatus::Active,
                to: AccountStatus::Active,
                ..
            })
        ));
        let revive = approve_loan(&db, second.id).await;
        assert!(matches!(
            revive,
            Err(Error::InvalidTransition {
                from: AccountStatus::Rejected,
                ..
            })
        ));

        // Approval alone moves no money.
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        assert_eq!(get_balance(&db, chequing.id, BalanceFilter::All).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_lifecycle_rejects_non_loan_accounts() -> Result<()> {
        let (db, _user, chequing) = setup_with_chequing().await?;

        let result = approve_loan(&db, chequing.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_disburse_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();

        let first = disburse(&db, loan.id, test_date()).await?;
        let second = disburse(&db, loan.id, test_date()).await?;
        let third = disburse(&db, loan.id, date(2024, 1, 16)).await?;

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(third.is_none());

        let entries = get_transactions(&db, chequing.id, &TransactionQuery::default()).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 100_000);
        assert!(get_loan(&db, loan.id).await?.disbursed);

        Ok(())
    }

    #[tokio::test]
    async fn test_disburse_waits_for_start_and_approval() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let start = date(2024, 2, 1);

        let pending =
            create_loan_request(&db, user.id, request(10_000, PaymentFrequency::Monthly, start), test_date())
                .await?;
        assert!(disburse(&db, pending.id, start).await?.is_none());

        approve_loan(&db, pending.id).await?;
        assert!(disburse(&db, pending.id, date(2024, 1, 31)).await?.is_none());
        assert!(disburse(&db, pending.id, start).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_disburse_without_chequing_is_invariant_violation() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        // Bypass the request path so no chequing account is created.
        let loan = create_test_loan(&db, user.id, 10_000, test_date()).await?;
        account::set_status(&db, loan.id, AccountStatus::Active).await?;

        let result = disburse(&db, loan.id, test_date()).await;
        assert!(result.as_ref().is_err_and(Error::is_invariant_violation));
        assert!(!get_loan(&db, loan.id).await?.disbursed);

        Ok(())
    }

    #[tokio::test]
    async fn test_process_interest_on_due_dates_only() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;

        assert_eq!(process_interest(&db, loan.id, date(2024, 2, 14)).await?, None);

        // 1000.00 × 12% × 31/365 = 10.19
        let charged = process_interest(&db, loan.id, date(2024, 2, 15)).await?;
        assert_eq!(charged, Some(1_019));
        assert_eq!(process_interest(&db, loan.id, date(2024, 2, 15)).await?, None);
        assert_eq!(process_interest(&db, loan.id, date(2024, 2, 20)).await?, None);

        assert_eq!(get_balance(&db, chequing.id, BalanceFilter::All).await?, 100_000 - 1_019);
        assert_eq!(get_balance(&db, loan.id, BalanceFilter::All).await?, 1_019);
        assert_eq!(get_loan(&db, loan.id).await?.last_interest_date, Some(date(2024, 2, 15)));

        Ok(())
    }

    #[tokio::test]
    async fn test_process_interest_catches_up_missed_periods() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        disburse(&db, loan.id, test_date()).await?;

        // Jan 15 → Apr 15 is 91 days: 1000.00 × 12% × 91/365 = 29.92
        let charged = process_interest(&db, loan.id, date(2024, 4, 20)).await?;
        assert_eq!(charged, Some(2_992));
        assert_eq!(get_loan(&db, loan.id).await?.last_interest_date, Some(date(2024, 4, 15)));

        Ok(())
    }

    #[tokio::test]
    async fn test_process_interest_may_drive_chequing_negative() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;

        // Spend the whole disbursement first.
        let saving = create_test_saving(&db, user.id).await?;
        transfer::execute_transfer(&db, TransferRequest::new(chequing.id, saving.id, 100_000, test_date()))
            .await?;

        process_interest(&db, loan.id, date(2024, 2, 15)).await?;
        assert_eq!(get_balance(&db, chequing.id, BalanceFilter::All).await?, -1_019);

        Ok(())
    }

    #[tokio::test]
    async fn test_at_maturity_loans_accrue_no_periodic_interest() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan =
            create_active_loan(&db, user.id, 100_000, PaymentFrequency::AtMaturity, test_date())
                .await?;
        disburse(&db, loan.id, test_date()).await?;

        assert_eq!(process_interest(&db, loan.id, date(2024, 6, 15)).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_outstanding_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        disburse(&db, loan.id, test_date()).await?;

        assert_eq!(outstanding_balance(&db, &loan, test_date()).await?, 100_000);
        // 365 days is a full year of simple interest.
        assert_eq!(outstanding_balance(&db, &loan, date(2025, 1, 14)).await?, 112_000);
        // Accrual stops at maturity (Jan 15 2025, 366 days because of the leap day).
        assert_eq!(outstanding_balance(&db, &loan, date(2026, 1, 1)).await?, 112_033);

        Ok(())
    }

    #[tokio::test]
    async fn test_late_disbursement_accrues_from_release() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let released = date(2024, 2, 9);
        disburse(&db, loan.id, released).await?;
        assert_eq!(get_loan(&db, loan.id).await?.disbursed_on, Some(released));

        assert_eq!(process_interest(&db, loan.id, date(2024, 2, 14)).await?, None);
        // 1000.00 × 12% × 6/365 = 1.97
        assert_eq!(process_interest(&db, loan.id, date(2024, 2, 15)).await?, Some(197));

        let loan = get_loan(&db, loan.id).await?;
        assert_eq!(outstanding_balance(&db, &loan, date(2024, 2, 15)).await?, 100_000);

        Ok(())
    }

    #[tokio::test]
    async fn test_payoff_on_due_date_includes_charged_interest() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;
        // 1000.00 × 12% × 31/365 = 10.19 charged on the due date
        assert_eq!(process_interest(&db, loan.id, date(2024, 2, 15)).await?, Some(1_019));

        fund_account(&db, chequing.id, 2_000).await?;

        // 0.10 of principal is still owed once the charged interest is counted.
        transfer::transfer_funds(&db, user.id, chequing.id, loan.id, 99_990, date(2024, 2, 15), None)
            .await?;
        assert!(!check_payoff(&db, loan.id, date(2024, 2, 15), 1).await?);

        transfer::transfer_funds(&db, user.id, chequing.id, loan.id, 10, date(2024, 2, 15), None)
            .await?;
        assert!(check_payoff(&db, loan.id, date(2024, 2, 15), 1).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_payoff_after_full_repayment() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;

        let next_day = date(2024, 1, 16);
        assert!(!check_payoff(&db, loan.id, next_day, 1).await?);

        transfer::transfer_funds(&db, user.id, chequing.id, loan.id, 100_000, next_day, None)
            .await?;
        assert!(check_payoff(&db, loan.id, next_day, 1).await?);
        assert_eq!(get_loan(&db, loan.id).await?.status, AccountStatus::PaidOff);

        // Terminal: neither payoff nor maturity fires again.
        assert!(!check_payoff(&db, loan.id, next_day, 1).await?);
        assert_eq!(check_maturity(&db, loan.id, date(2025, 2, 1)).await?, None);
        assert_eq!(get_loan(&db, loan.id).await?.status, AccountStatus::PaidOff);

        Ok(())
    }

    #[tokio::test]
    async fn test_payoff_respects_tolerance() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan = create_active_loan(&db, user.id, 100_000, PaymentFrequency::Monthly, test_date())
            .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;

        let next_day = date(2024, 1, 16);
        transfer::transfer_funds(&db, user.id, chequing.id, loan.id, 99_995, next_day, None)
            .await?;

        assert!(!check_payoff(&db, loan.id, next_day, 1).await?);
        assert!(check_payoff(&db, loan.id, next_day, 5).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_maturity_force_settles_and_closes() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let loan =
            create_active_loan(&db, user.id, 100_000, PaymentFrequency::AtMaturity, test_date())
                .await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;

        assert_eq!(check_maturity(&db, loan.id, date(2025, 1, 14)).await?, None);

        // 1000.00 × 12% × 366/365 = 120.33
        let collected = check_maturity(&db, loan.id, date(2025, 1, 15)).await?;
        assert_eq!(collected, Some(112_033));
        assert_eq!(get_loan(&db, loan.id).await?.status, AccountStatus::Closed);
        assert_eq!(get_balance(&db, chequing.id, BalanceFilter::All).await?, -12_033);
        assert_eq!(outstanding_balance(&db, &loan, date(2025, 1, 15)).await?, 0);

        // Closed is terminal.
        assert_eq!(check_maturity(&db, loan.id, date(2025, 1, 16)).await?, None);
        assert!(!check_payoff(&db, loan.id, date(2025, 1, 16), 1).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_loan_interest_and_maturity_do_not_double_charge() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let mut req = request(100_000, PaymentFrequency::Monthly, test_date());
        req.term_months = 2;
        let loan = create_loan_request(&db, user.id, req, test_date()).await?;
        approve_loan(&db, loan.id).await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        disburse(&db, loan.id, test_date()).await?;

        let first = process_interest(&db, loan.id, date(2024, 2, 15)).await?.unwrap();
        let second = process_interest(&db, loan.id, date(2024, 3, 15)).await?.unwrap();
        let collected = check_maturity(&db, loan.id, date(2024, 3, 15)).await?.unwrap();

        // Only the principal is left to collect at maturity.
        assert_eq!(collected, 100_000);
        assert_eq!(
            get_balance(&db, chequing.id, BalanceFilter::All).await?,
            -(first + second)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_repayment_reduces_owed_amount() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let mut req = request(20_000, PaymentFrequency::Monthly, test_date());
        req.interest_rate = 0.0;
        let loan = create_loan_request(&db, user.id, req, test_date()).await?;
        approve_loan(&db, loan.id).await?;
        account::mark_disbursed(&db, loan.id, test_date()).await?;
        let chequing = account::find_chequing(&db, user.id).await?.unwrap();
        fund_account(&db, chequing.id, 10_000).await?;

        let loan = get_loan(&db, loan.id).await?;
        assert_eq!(outstanding_balance(&db, &loan, test_date()).await?, 20_000);

        transfer::transfer_funds(&db, user.id, chequing.id, loan.id, 5_000, test_date(), None)
            .await?;

        assert_eq!(get_balance(&db, chequing.id, BalanceFilter::All).await?, 5_000);
        assert_eq!(outstanding_balance(&db, &loan, test_date()).await?, 15_000);

        Ok(())
    }
}
