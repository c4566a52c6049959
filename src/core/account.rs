//! Account registry - owns account metadata and raw status changes.
//!
//! The registry is a plain store: [`set_status`] writes whatever it is given.
//! Whether a transition is legal is decided by the loan and GIC lifecycle
//! managers, which use the compare-and-set helpers here so that the status check
//! and the write happen in a single statement.

use crate::{
    core::user,
    entities::{Account, AccountStatus, AccountType, PaymentFrequency, account},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, SqlErr, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Attributes of an account about to be created.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Chequing, loan, investment or saving
    pub account_type: AccountType,
    /// Initial status
    pub status: AccountStatus,
    /// Principal in cents
    pub principal: i64,
    /// Annual rate in percent
    pub interest_rate: f64,
    /// Term in months
    pub term_months: i32,
    /// Start of the term / opening date
    pub start_date: NaiveDate,
    /// Schedule for loans and GICs
    pub payment_frequency: Option<PaymentFrequency>,
    /// Free text
    pub description: String,
    /// Source product for GICs
    pub gic_product_id: Option<i64>,
}

impl NewAccount {
    /// An active operating account (chequing or saving) with no terms attached.
    #[must_use]
    pub fn operating(account_type: AccountType, opened_on: NaiveDate) -> Self {
        Self {
            account_type,
            status: AccountStatus::Active,
            principal: 0,
            interest_rate: 0.0,
            term_months: 0,
            start_date: opened_on,
            payment_frequency: None,
            description: account_type.to_string(),
            gic_product_id: None,
        }
    }
}

/// Term of a loan or GIC as an unsigned month count.
pub fn term_of(account: &account::Model) -> Result<u32> {
    u32::try_from(account.term_months).map_err(|_| {
        Error::invariant(format!(
            "account {} has negative term {}",
            account.id, account.term_months
        ))
    })
}

/// Inserts a new account row.
pub async fn create_account<C>(conn: &C, user_id: i64, attrs: NewAccount) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    if attrs.principal < 0 {
        return Err(Error::InvalidAmount {
            amount: attrs.principal,
        });
    }
    if attrs.term_months < 0 {
        return Err(Error::validation("term cannot be negative"));
    }

    let model = account::ActiveModel {
        user_id: Set(user_id),
        account_type: Set(attrs.account_type),
        status: Set(attrs.status),
        principal: Set(attrs.principal),
        interest_rate: Set(attrs.interest_rate),
        term_months: Set(attrs.term_months),
        start_date: Set(attrs.start_date),
        payment_frequency: Set(attrs.payment_frequency),
        description: Set(attrs.description),
        gic_product_id: Set(attrs.gic_product_id),
        disbursed: Set(false),
        disbursed_on: Set(None),
        last_interest_date: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let created = model.insert(conn).await?;
    debug!(
        "Created {} account {} for user {} ({})",
        created.account_type, created.id, user_id, created.status
    );
    Ok(created)
}

/// Finds an account by its unique ID, returning None if it does not exist.
pub async fn get_account_by_id<C>(conn: &C, account_id: i64) -> Result<Option<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find_by_id(account_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Finds an account by its unique ID or fails with `NotFound`.
pub async fn get_account<C>(conn: &C, account_id: i64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    get_account_by_id(conn, account_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "account",
            id: account_id,
        })
}

/// Overwrites the status of an account without checking the transition.
pub async fn set_status<C>(conn: &C, account_id: i64, status: AccountStatus) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Account::update_many()
        .col_expr(account::Column::Status, Expr::value(status.to_value()))
        .filter(account::Column::Id.eq(account_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "account",
            id: account_id,
        });
    }
    Ok(())
}

/// Moves an account from `expected` to `status` in one statement.
///
/// Returns `false` when the stored status was not `expected` (or the account does
/// not exist); nothing is written in that case.
pub async fn compare_and_set_status<C>(
    conn: &C,
    account_id: i64,
    expected: AccountStatus,
    status: AccountStatus,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Account::update_many()
        .col_expr(account::Column::Status, Expr::value(status.to_value()))
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::Status.eq(expected))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Sets the loan disbursement flag and date if the flag is not set yet. Returns
/// whether this call set it.
pub async fn mark_disbursed<C>(conn: &C, account_id: i64, date: NaiveDate) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Account::update_many()
        .col_expr(account::Column::Disbursed, Expr::value(true))
        .col_expr(account::Column::DisbursedOn, Expr::value(date))
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::Disbursed.eq(false))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Advances the interest marker from `previous` to `date`. Returns `false` if the
/// stored marker no longer equals `previous`.
pub async fn advance_interest_marker<C>(
    conn: &C,
    account_id: i64,
    previous: Option<NaiveDate>,
    date: NaiveDate,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut update = Account::update_many()
        .col_expr(account::Column::LastInterestDate, Expr::value(date))
        .filter(account::Column::Id.eq(account_id));
    update = match previous {
        Some(previous) => update.filter(account::Column::LastInterestDate.eq(previous)),
        None => update.filter(account::Column::LastInterestDate.is_null()),
    };

    let result = update.exec(conn).await?;
    Ok(result.rows_affected == 1)
}

/// The user's chequing account, if it has been created.
pub async fn find_chequing<C>(conn: &C, user_id: i64) -> Result<Option<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find()
        .filter(account::Column::UserId.eq(user_id))
        .filter(account::Column::AccountType.eq(AccountType::Chequing))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Returns the user's chequing account, creating it with a zero balance on first
/// access.
///
/// Safe to call concurrently: if another caller wins the race the unique index on
/// chequing accounts rejects the second insert and the existing row is returned.
pub async fn get_or_create_chequing<C>(conn: &C, user_id: i64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_chequing(conn, user_id).await? {
        return Ok(existing);
    }

    // Fail with NotFound rather than a foreign-key error for unknown users.
    user::get_user(conn, user_id).await?;

    let opened_on = chrono::Local::now().date_naive();
    let attrs = NewAccount::operating(AccountType::Chequing, opened_on);
    match create_account(conn, user_id, attrs).await {
        Ok(created) => {
            info!("Opened chequing account {} for user {}", created.id, user_id);
            Ok(created)
        }
        Err(Error::Database(err))
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
            find_chequing(conn, user_id).await?.ok_or_else(|| {
                Error::invariant(format!(
                    "chequing account for user {user_id} rejected as duplicate but not found"
                ))
            })
        }
        Err(err) => Err(err),
    }
}

/// All accounts of a user, oldest first.
pub async fn get_user_accounts<C>(conn: &C, user_id: i64) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find()
        .filter(account::Column::UserId.eq(user_id))
        .order_by_asc(account::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

async fn get_user_instruments<C>(
    conn: &C,
    user_id: i64,
    account_type: AccountType,
    status: Option<AccountStatus>,
) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Account::find()
        .filter(account::Column::UserId.eq(user_id))
        .filter(account::Column::AccountType.eq(account_type));
    if let Some(status) = status {
        query = query.filter(account::Column::Status.eq(status));
    }
    query
        .order_by_asc(account::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Loans of a user, optionally restricted to one status.
pub async fn get_user_loans<C>(
    conn: &C,
    user_id: i64,
    status: Option<AccountStatus>,
) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    get_user_instruments(conn, user_id, AccountType::Loan, status).await
}

/// GICs of a user, optionally restricted to one status.
pub async fn get_user_gics<C>(
    conn: &C,
    user_id: i64,
    status: Option<AccountStatus>,
) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    get_user_instruments(conn, user_id, AccountType::Investment, status).await
}

/// Every account of a type in a status, ordered by id. Used by the settlement run
/// to take its snapshot.
pub async fn get_accounts_by_type_and_status<C>(
    conn: &C,
    account_type: AccountType,
    status: AccountStatus,
) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find()
        .filter(account::Column::AccountType.eq(account_type))
        .filter(account::Column::Status.eq(status))
        .order_by_asc(account::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Loan requests waiting for an admin decision.
pub async fn get_pending_loans<C>(conn: &C) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    get_accounts_by_type_and_status(conn, AccountType::Loan, AccountStatus::Pending).await
}
