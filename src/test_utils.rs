//! Shared test utilities for the ledger engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test users, accounts and entries with sensible defaults.

use crate::{
    core::{
        account::{self, NewAccount},
        gic,
        ledger::{self, NewEntry},
        loan::{self, LoanRequest},
        transfer, user,
    },
    entities::{
        AccountStatus, AccountType, PaymentFrequency, TransactionStatus, TransactionType, UserRole,
        account as account_entity, gic_product, transaction, user as user_entity,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// The fixed "today" used across tests: 2024-01-15.
#[allow(clippy::unwrap_used)]
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

/// Creates a client user whose display name matches the username.
pub async fn create_test_user(db: &DatabaseConnection, username: &str) -> Result<user_entity::Model> {
    user::create_user(db, username, username, UserRole::Client).await
}

/// Fresh database with one user ("alice") and their chequing account.
pub async fn setup_with_chequing() -> Result<(DatabaseConnection, user_entity::Model, account_entity::Model)>
{
    let db = setup_test_db().await?;
    let alice = create_test_user(&db, "alice").await?;
    let chequing = account::get_or_create_chequing(&db, alice.id).await?;
    Ok((db, alice, chequing))
}

/// Opens an active saving account for a user.
pub async fn create_test_saving(db: &DatabaseConnection, user_id: i64) -> Result<account_entity::Model> {
    account::create_account(db, user_id, NewAccount::operating(AccountType::Saving, test_date())).await
}

/// Creates a `Pending` loan directly, bypassing request validation.
///
/// # Defaults
/// * `interest_rate`: 12%
/// * `term_months`: 12
/// * `payment_frequency`: Monthly
pub async fn create_test_loan(
    db: &DatabaseConnection,
    user_id: i64,
    principal: i64,
    start_date: NaiveDate,
) -> Result<account_entity::Model> {
    account::create_account(
        db,
        user_id,
        NewAccount {
            account_type: AccountType::Loan,
            status: AccountStatus::Pending,
            principal,
            interest_rate: 12.0,
            term_months: 12,
            start_date,
            payment_frequency: Some(PaymentFrequency::Monthly),
            description: "Test loan".to_string(),
            gic_product_id: None,
        },
    )
    .await
}

/// Requests and approves a 12-month loan at 12%, starting on `start_date`.
/// The borrower's chequing account is created on the way.
pub async fn create_active_loan(
    db: &DatabaseConnection,
    user_id: i64,
    principal: i64,
    payment_frequency: PaymentFrequency,
    start_date: NaiveDate,
) -> Result<account_entity::Model> {
    let pending = loan::create_loan_request(
        db,
        user_id,
        LoanRequest {
            amount: principal,
            interest_rate: 12.0,
            term_months: 12,
            start_date,
            payment_frequency,
            description: "Test loan".to_string(),
        },
        start_date,
    )
    .await?;
    loan::approve_loan(db, pending.id).await
}

/// Appends a raw ledger entry dated [`test_date`].
pub async fn post_test_entry(
    db: &DatabaseConnection,
    account_id: i64,
    transaction_type: TransactionType,
    amount: i64,
    status: TransactionStatus,
) -> Result<transaction::Model> {
    ledger::append_entry(
        db,
        NewEntry {
            account_id,
            transaction_type,
            amount,
            date: test_date(),
            description: "Test entry".to_string(),
            status,
            transfer_id: None,
        },
    )
    .await
}

/// Credits an account with an approved system deposit.
pub async fn fund_account(db: &DatabaseConnection, account_id: i64, cents: i64) -> Result<transaction::Model> {
    transfer::create_system_transaction(
        db,
        account_id,
        TransactionType::Deposit,
        cents,
        test_date(),
        "Test funding",
    )
    .await
}

/// Creates an active GIC product. `minimum_amount` is in cents.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    interest_rate: f64,
    term_months: u32,
    minimum_amount: i64,
) -> Result<gic_product::Model> {
    gic::create_product(db, name, interest_rate, term_months, minimum_amount).await
}
