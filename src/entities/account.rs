//! Account entity - one row per financial instrument.
//!
//! Chequing and saving accounts only use the common columns. Loans and GICs also
//! carry their terms (`principal`, `interest_rate`, `term_months`, `start_date`,
//! `payment_frequency`). There is no balance column: balances are
//! always derived from the `transactions` ledger.

use super::enums::{AccountStatus, AccountType, PaymentFrequency};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Chequing, loan, investment or saving
    pub account_type: AccountType,
    /// Lifecycle status
    pub status: AccountStatus,
    /// Loan amount or GIC principal in cents; zero for operating accounts
    pub principal: i64,
    /// Annual interest rate in percent
    pub interest_rate: f64,
    /// Term length in months; zero for operating accounts
    pub term_months: i32,
    /// First day of the term (opening date for operating accounts)
    pub start_date: Date,
    /// Repayment schedule, only set for loans and GICs
    pub payment_frequency: Option<PaymentFrequency>,
    /// Free-text description
    pub description: String,
    /// Product a GIC was purchased from
    pub gic_product_id: Option<i64>,
    /// Set once the loan principal has been paid into chequing
    pub disbursed: bool,
    /// Day the principal was paid out; loan interest accrues from here
    pub disbursed_on: Option<Date>,
    /// Last due date for which loan interest was posted
    pub last_interest_date: Option<Date>,
    /// When the row was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each account belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One account has many ledger entries
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True for loans.
    #[must_use]
    pub fn is_loan(&self) -> bool {
        self.account_type == AccountType::Loan
    }

    /// True for GIC investments.
    #[must_use]
    pub fn is_investment(&self) -> bool {
        self.account_type == AccountType::Investment
    }
}
