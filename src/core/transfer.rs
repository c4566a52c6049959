//! Transfer engine - moves money between accounts as two ledger legs.
//!
//! A transfer is a `Withdrawal` on the source and a `Deposit` on the destination,
//! both approved, sharing one random transfer id and value date. Both legs are
//! appended inside one storage transaction, so no reader ever sees just one leg.
//!
//! [`execute_transfer`] performs no funds check: settlement uses it to force
//! interest and maturity payments even when that drives chequing negative.
//! User-initiated moves go through [`transfer_funds`], which does check.

use crate::{
    core::{
        account,
        ledger::{self, BalanceFilter, NewEntry},
    },
    entities::{AccountStatus, AccountType, TransactionStatus, TransactionType, transaction},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{debug, info};
use uuid::Uuid;

/// A request to move `amount` cents from one account to another.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Account that is debited
    pub source_account_id: i64,
    /// Account that is credited
    pub destination_account_id: i64,
    /// Strictly positive amount in cents
    pub amount: i64,
    /// Value date of both legs
    pub date: NaiveDate,
    /// Description on the withdrawal leg
    pub source_description: String,
    /// Description on the deposit leg
    pub destination_description: String,
}

impl TransferRequest {
    /// A transfer with default "Transfer to/from account N" descriptions.
    #[must_use]
    pub fn new(
        source_account_id: i64,
        destination_account_id: i64,
        amount: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            source_account_id,
            destination_account_id,
            amount,
            date,
            source_description: format!("Transfer to account {destination_account_id}"),
            destination_description: format!("Transfer from account {source_account_id}"),
        }
    }

    /// Uses the same description on both legs.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.source_description.clone_from(&description);
        self.destination_description = description;
        self
    }

    /// Sets separate descriptions for the two legs.
    #[must_use]
    pub fn with_descriptions(
        mut self,
        source_description: impl Into<String>,
        destination_description: impl Into<String>,
    ) -> Self {
        self.source_description = source_description.into();
        self.destination_description = destination_description.into();
        self
    }
}

/// Writes both legs of a transfer atomically and returns the transfer id.
///
/// When `conn` is already a storage transaction the legs are written in a
/// savepoint, so they commit or roll back with the caller's work.
pub async fn execute_transfer<C>(conn: &C, request: TransferRequest) -> Result<String>
where
    C: ConnectionTrait + TransactionTrait,
{
    if request.amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: request.amount,
        });
    }
    if request.source_account_id == request.destination_account_id {
        return Err(Error::validation(
            "source and destination accounts must differ",
        ));
    }

    let txn = conn.begin().await?;

    account::get_account(&txn, request.source_account_id).await?;
    account::get_account(&txn, request.destination_account_id).await?;

    let transfer_id = Uuid::new_v4().to_string();

    ledger::append_entry(
        &txn,
        NewEntry {
            account_id: request.source_account_id,
            transaction_type: TransactionType::Withdrawal,
            amount: request.amount,
            date: request.date,
            description: request.source_description,
            status: TransactionStatus::Approved,
            transfer_id: Some(transfer_id.clone()),
        },
    )
    .await?;

    ledger::append_entry(
        &txn,
        NewEntry {
            account_id: request.destination_account_id,
            transaction_type: TransactionType::Deposit,
            amount: request.amount,
            date: request.date,
            description: request.destination_description,
            status: TransactionStatus::Approved,
            transfer_id: Some(transfer_id.clone()),
        },
    )
    .await?;

    txn.commit().await?;

    debug!(
        "Transfer {}: {} cents from account {} to account {}",
        transfer_id, request.amount, request.source_account_id, request.destination_account_id
    );
    Ok(transfer_id)
}

/// Posts one auto-approved entry on behalf of the system (loan disbursements,
/// GIC interest credits).
pub async fn create_system_transaction<C>(
    conn: &C,
    account_id: i64,
    transaction_type: TransactionType,
    amount: i64,
    date: NaiveDate,
    description: impl Into<String>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    account::get_account(conn, account_id).await?;

    ledger::append_entry(
        conn,
        NewEntry {
            account_id,
            transaction_type,
            amount,
            date,
            description: description.into(),
            status: TransactionStatus::Approved,
            transfer_id: None,
        },
    )
    .await
}

/// User-initiated transfer between accounts.
///
/// The source must be the user's own active chequing or saving account and must
/// cover `amount` from its available balance. The destination must be active and
/// cannot be an investment (GICs are bought through the GIC manager). Transfers
/// into an active loan account are repayments.
///
/// The funds check happens before the write transaction opens; two concurrent
/// transfers can both pass it.
pub async fn transfer_funds(
    db: &DatabaseConnection,
    user_id: i64,
    source_account_id: i64,
    destination_account_id: i64,
    amount: i64,
    date: NaiveDate,
    description: Option<String>,
) -> Result<String> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let source = account::get_account(db, source_account_id).await?;
    if source.user_id != user_id {
        return Err(Error::validation(format!(
            "account {source_account_id} does not belong to user {user_id}"
        )));
    }
    if !matches!(
        source.account_type,
        AccountType::Chequing | AccountType::Saving
    ) {
        return Err(Error::validation(format!(
            "cannot transfer out of a {} account",
            source.account_type
        )));
    }
    if source.status != AccountStatus::Active {
        return Err(Error::validation(format!(
            "source account {source_account_id} is {}",
            source.status
        )));
    }

    let destination = account::get_account(db, destination_account_id).await?;
    if destination.status != AccountStatus::Active {
        return Err(Error::validation(format!(
            "destination account {destination_account_id} is {}",
            destination.status
        )));
    }
    if destination.account_type == AccountType::Investment {
        return Err(Error::validation(
            "investments can only be funded by purchasing a GIC",
        ));
    }

    let available = ledger::get_balance(db, source_account_id, BalanceFilter::Approved).await?;
    if available < amount {
        return Err(Error::InsufficientFunds {
            available,
            required: amount,
        });
    }

    let mut request = TransferRequest::new(source_account_id, destination_account_id, amount, date);
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        request = request.with_description(description);
    }

    let transfer_id = execute_transfer(db, request).await?;
    info!(
        "User {} transferred {} cents from account {} to account {} ({})",
        user_id, amount, source_account_id, destination_account_id, transfer_id
    );
    Ok(transfer_id)
}
