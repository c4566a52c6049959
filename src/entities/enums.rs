//! Closed domain vocabularies persisted as integer codes.
//!
//! Every enumeration here is a fixed, versioned set. The integer codes are part of
//! the on-disk format and must never be renumbered; new variants get new codes.
//! [`LookupVocabulary`] exposes each set as rows for the `lookup_codes` table so
//! the schema can be validated against the compiled-in tables at startup.

use sea_orm::{Iterable, entity::prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed enumeration that is mirrored into the `lookup_codes` table.
pub trait LookupVocabulary: ActiveEnum<Value = i32> + Iterable + Copy {
    /// Domain name used as the first half of the lookup key.
    const DOMAIN: &'static str;

    /// Human-readable label stored next to the code.
    fn label(&self) -> &'static str;

    /// All `(code, label)` rows of this vocabulary.
    fn lookup_rows() -> Vec<(i32, &'static str)> {
        Self::iter().map(|v| (v.to_value(), v.label())).collect()
    }
}

/// Role of a user. `Auditor` is reserved and has no behaviour attached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum UserRole {
    /// Bank staff: approves loans, manages products
    #[sea_orm(num_value = 1)]
    Admin,
    /// Regular customer
    #[sea_orm(num_value = 2)]
    Client,
    /// Reserved
    #[sea_orm(num_value = 3)]
    Auditor,
}

/// Kind of financial instrument an account row represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum AccountType {
    /// The user's single operating account
    #[sea_orm(num_value = 1)]
    Chequing,
    /// A loan; its ledger holds repayments and interest payments
    #[sea_orm(num_value = 2)]
    Loan,
    /// A GIC investment certificate
    #[sea_orm(num_value = 3)]
    Investment,
    /// Plain savings account
    #[sea_orm(num_value = 4)]
    Saving,
}

/// Account lifecycle status. Transitions are monotonic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum AccountStatus {
    /// Loan request awaiting an admin decision
    #[sea_orm(num_value = 1)]
    Pending,
    /// Funded or approved, accruing
    #[sea_orm(num_value = 2)]
    Active,
    /// Loan request denied; no funds moved
    #[sea_orm(num_value = 3)]
    Rejected,
    /// Loan repaid in full before maturity
    #[sea_orm(num_value = 4)]
    PaidOff,
    /// Matured and settled
    #[sea_orm(num_value = 5)]
    Closed,
}

/// Direction of a ledger entry.
///
/// Transfer legs are stored as a `Withdrawal` and a `Deposit` sharing a transfer id;
/// `Transfer` is kept in the persisted vocabulary but is never appended.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum TransactionType {
    /// Money in
    #[sea_orm(num_value = 1)]
    Deposit,
    /// Money out
    #[sea_orm(num_value = 2)]
    Withdrawal,
    /// Legacy grouping code
    #[sea_orm(num_value = 3)]
    Transfer,
}

/// Approval state of a ledger entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum TransactionStatus {
    /// Entered manually, waiting for an admin
    #[sea_orm(num_value = 1)]
    Pending,
    /// Counts towards the available balance
    #[sea_orm(num_value = 2)]
    Approved,
}

/// Repayment schedule of a loan. GICs always use `AtMaturity`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum PaymentFrequency {
    /// Every 14 days after the start date
    #[sea_orm(num_value = 1)]
    BiWeekly,
    /// Same day of month as the start date
    #[sea_orm(num_value = 2)]
    Monthly,
    /// Anniversary of the start date
    #[sea_orm(num_value = 3)]
    Annually,
    /// Nothing is due until maturity
    #[sea_orm(num_value = 4)]
    AtMaturity,
}

impl LookupVocabulary for UserRole {
    const DOMAIN: &'static str = "roles";

    fn label(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Client => "Client",
            Self::Auditor => "Auditor",
        }
    }
}

impl LookupVocabulary for AccountType {
    const DOMAIN: &'static str = "account_types";

    fn label(&self) -> &'static str {
        match self {
            Self::Chequing => "Chequing",
            Self::Loan => "Loan",
            Self::Investment => "Investment",
            Self::Saving => "Saving",
        }
    }
}

impl LookupVocabulary for AccountStatus {
    const DOMAIN: &'static str = "account_statuses";

    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Rejected => "Rejected",
            Self::PaidOff => "PaidOff",
            Self::Closed => "Closed",
        }
    }
}

impl LookupVocabulary for TransactionType {
    const DOMAIN: &'static str = "transaction_types";

    fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Withdrawal => "Withdrawal",
            Self::Transfer => "Transfer",
        }
    }
}

impl LookupVocabulary for TransactionStatus {
    const DOMAIN: &'static str = "transaction_statuses";

    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
        }
    }
}

impl LookupVocabulary for PaymentFrequency {
    const DOMAIN: &'static str = "payment_frequencies";

    fn label(&self) -> &'static str {
        match self {
            Self::BiWeekly => "BiWeekly",
            Self::Monthly => "Monthly",
            Self::Annually => "Annually",
            Self::AtMaturity => "AtMaturity",
        }
    }
}

macro_rules! display_via_label {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )+
    };
}

display_via_label!(
    UserRole,
    AccountType,
    AccountStatus,
    TransactionType,
    TransactionStatus,
    PaymentFrequency,
);

/// Every vocabulary as `(domain, rows)`, in a stable order.
#[must_use]
pub fn all_lookup_tables() -> Vec<(&'static str, Vec<(i32, &'static str)>)> {
    vec![
        (UserRole::DOMAIN, UserRole::lookup_rows()),
        (AccountType::DOMAIN, AccountType::lookup_rows()),
        (AccountStatus::DOMAIN, AccountStatus::lookup_rows()),
        (TransactionType::DOMAIN, TransactionType::lookup_rows()),
        (TransactionStatus::DOMAIN, TransactionStatus::lookup_rows()),
        (PaymentFrequency::DOMAIN, PaymentFrequency::lookup_rows()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AccountType::Chequing.to_value(), 1);
        assert_eq!(AccountType::Saving.to_value(), 4);
        assert_eq!(AccountStatus::Closed.to_value(), 5);
        assert_eq!(TransactionType::Withdrawal.to_value(), 2);
        assert_eq!(PaymentFrequency::AtMaturity.to_value(), 4);
        assert_eq!(UserRole::Auditor.to_value(), 3);
    }

    #[test]
    fn test_codes_round_trip_and_reject_unknown() {
        assert_eq!(AccountStatus::try_from_value(&4).ok(), Some(AccountStatus::PaidOff));
        assert!(AccountStatus::try_from_value(&99).is_err());
    }

    #[test]
    fn test_lookup_tables_have_unique_codes() {
        for (domain, rows) in all_lookup_tables() {
            let mut codes: Vec<i32> = rows.iter().map(|(code, _)| *code).collect();
            codes.sort_unstable();
            codes.dedup();
            assert_eq!(codes.len(), rows.len(), "duplicate code in {domain}");
        }
    }
}
