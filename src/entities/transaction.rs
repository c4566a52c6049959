//! Transaction entity - one immutable ledger entry.
//!
//! `amount` is always a positive number of cents; the direction comes from
//! `transaction_type`. The two legs of a transfer share a `transfer_id`.
//! `date` is the value date and is independent of `created_at`.
use super::enums::{TransactionStatus, TransactionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account the entry is posted to
    pub account_id: i64,
    /// Deposit or withdrawal
    pub transaction_type: TransactionType,
    /// Strictly positive amount in cents
    pub amount: i64,
    /// Value date
    pub date: Date,
    /// Human-readable description of the entry
    pub description: String,
    /// Shared by both legs of a transfer
    pub transfer_id: Option<String>,
    /// Pending entries do not count towards the available balance
    pub status: TransactionStatus,
    /// When the entry was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Signed effect of this entry on its account balance, in cents.
    #[must_use]
    pub const fn signed_amount(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Deposit => self.amount,
            TransactionType::Withdrawal => -self.amount,
            TransactionType::Transfer => 0,
        }
    }
}
