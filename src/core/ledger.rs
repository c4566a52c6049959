//! Ledger store - the append-only record of monetary events.
//!
//! Balances are never stored. Every balance the engine reports is derived here as
//! `Σ deposits − Σ withdrawals` over the entries matching a [`BalanceFilter`].
//! Functions that only write or read take any [`ConnectionTrait`] so they can run
//! inside a caller's storage transaction; the two legs of a transfer are appended
//! through the same transaction and therefore become visible together.

use crate::{
    core::account,
    entities::{AccountStatus, AccountType, Transaction, TransactionStatus, TransactionType, transaction},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, warn};

/// Which entries count towards a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceFilter {
    /// Every entry, pending or approved ("total balance")
    All,
    /// Approved entries only ("available balance")
    Approved,
}

/// A ledger entry waiting to be appended.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Account to post to
    pub account_id: i64,
    /// Deposit or withdrawal
    pub transaction_type: TransactionType,
    /// Strictly positive amount in cents
    pub amount: i64,
    /// Value date
    pub date: NaiveDate,
    /// Description shown on statements
    pub description: String,
    /// Approval state
    pub status: TransactionStatus,
    /// Groups the two legs of a transfer
    pub transfer_id: Option<String>,
}

/// Filters for [`get_transactions`].
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    /// Earliest value date (inclusive)
    pub from: Option<NaiveDate>,
    /// Latest value date (inclusive)
    pub to: Option<NaiveDate>,
    /// Maximum number of entries, newest first
    pub limit: Option<u64>,
}

/// Appends one entry to the ledger.
///
/// Rejects non-positive amounts and the `Transfer` type: direction must always be
/// carried by `Deposit`/`Withdrawal`, never by sign.
pub async fn append_entry<C>(conn: &C, entry: NewEntry) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    if entry.amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: entry.amount,
        });
    }
    if entry.transaction_type == TransactionType::Transfer {
        return Err(Error::validation(
            "ledger entries must be a Deposit or a Withdrawal",
        ));
    }

    let model = transaction::ActiveModel {
        account_id: Set(entry.account_id),
        transaction_type: Set(entry.transaction_type),
        amount: Set(entry.amount),
        date: Set(entry.date),
        description: Set(entry.description),
        transfer_id: Set(entry.transfer_id),
        status: Set(entry.status),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    model.insert(conn).await.map_err(Into::into)
}

/// Derived balance of an account in cents.
pub async fn get_balance<C>(conn: &C, account_id: i64, filter: BalanceFilter) -> Result<i64>
where
    C: ConnectionTrait,
{
    let deposits = sum_entries(conn, account_id, TransactionType::Deposit, filter).await?;
    let withdrawals = sum_entries(conn, account_id, TransactionType::Withdrawal, filter).await?;
    Ok(deposits - withdrawals)
}

async fn sum_entries<C>(
    conn: &C,
    account_id: i64,
    transaction_type: TransactionType,
    filter: BalanceFilter,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let mut query = Transaction::find()
        .select_only()
        .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
        .filter(transaction::Column::AccountId.eq(account_id))
        .filter(transaction::Column::TransactionType.eq(transaction_type));

    if filter == BalanceFilter::Approved {
        query = query.filter(transaction::Column::Status.eq(TransactionStatus::Approved));
    }

    let total: Option<Option<i64>> = query.into_tuple().one(conn).await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Entries of an account, newest value date first.
pub async fn get_transactions<C>(
    conn: &C,
    account_id: i64,
    query: &TransactionQuery,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let mut select = Transaction::find().filter(transaction::Column::AccountId.eq(account_id));

    if let Some(from) = query.from {
        select = select.filter(transaction::Column::Date.gte(from));
    }
    if let Some(to) = query.to {
        select = select.filter(transaction::Column::Date.lte(to));
    }

    let mut select = select
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id);
    if let Some(limit) = query.limit {
        select = select.limit(limit);
    }

    select.all(conn).await.map_err(Into::into)
}

/// Retrieves a specific entry by its unique ID.
pub async fn get_transaction_by_id<C>(
    conn: &C,
    transaction_id: i64,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Both legs of a transfer, withdrawal first.
pub async fn get_transfer_legs<C>(conn: &C, transfer_id: &str) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::TransferId.eq(transfer_id))
        .order_by_desc(transaction::Column::TransactionType)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Records a manual deposit or withdrawal entered by a user.
///
/// Only the user's own active chequing or saving accounts accept manual entries.
/// The entry is created `Pending` and does not affect the available balance until
/// an admin approves it. Withdrawals may not exceed the available balance at the
/// time of entry.
pub async fn create_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    account_id: i64,
    transaction_type: TransactionType,
    amount: i64,
    date: NaiveDate,
    description: String,
) -> Result<transaction::Model> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let account = account::get_account(db, account_id).await?;
    if account.user_id != user_id {
        return Err(Error::validation(format!(
            "account {account_id} does not belong to user {user_id}"
        )));
    }
    if !matches!(
        account.account_type,
        AccountType::Chequing | AccountType::Saving
    ) {
        return Err(Error::validation(format!(
            "manual entries are not allowed on {} accounts",
            account.account_type
        )));
    }
    if account.status != AccountStatus::Active {
        return Err(Error::validation(format!(
            "account {account_id} is {}",
            account.status
        )));
    }

    if transaction_type == TransactionType::Withdrawal {
        let available = get_balance(db, account_id, BalanceFilter::Approved).await?;
        if available < amount {
            return Err(Error::InsufficientFunds {
                available,
                required: amount,
            });
        }
    }

    let entry = append_entry(
        db,
        NewEntry {
            account_id,
            transaction_type,
            amount,
            date,
            description,
            status: TransactionStatus::Pending,
            transfer_id: None,
        },
    )
    .await?;

    info!(
        "User {} entered pending {} of {} on account {}",
        user_id, transaction_type, amount, account_id
    );
    Ok(entry)
}

/// Admin override: marks a pending entry as approved.
pub async fn approve_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    let result = Transaction::update_many()
        .col_expr(
            transaction::Column::Status,
            Expr::value(TransactionStatus::Approved.to_value()),
        )
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(db)
        .await?;

    let entry = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    if result.rows_affected == 0 {
        return Err(Error::validation(format!(
            "transaction {transaction_id} is already approved"
        )));
    }

    info!("Approved transaction {}", transaction_id);
    Ok(entry)
}

/// Admin audit exception: removes an entry from the ledger.
///
/// Deleting either leg of a transfer removes both legs in one storage
/// transaction, so balances stay conserved. Returns the number of entries removed.
pub async fn delete_transaction(db: &DatabaseConnection, transaction_id: i64) -> Result<u64> {
    let txn = db.begin().await?;

    let entry = get_transaction_by_id(&txn, transaction_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    let removed = match &entry.transfer_id {
        Some(transfer_id) => {
            Transaction::delete_many()
                .filter(transaction::Column::TransferId.eq(transfer_id.as_str()))
                .exec(&txn)
                .await?
                .rows_affected
        }
        None => entry.clone().delete(&txn).await?.rows_affected,
    };

    txn.commit().await?;

    warn!(
        "Deleted {} ledger entr{} starting from transaction {} (account {}, {} {})",
        removed,
        if removed == 1 { "y" } else { "ies" },
        transaction_id,
        entry.account_id,
        entry.transaction_type,
        entry.amount
    );
    Ok(removed)
}
