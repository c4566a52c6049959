//! Unified error types for the ledger engine.
//!
//! Lifecycle managers and the transfer engine return these typed errors; the
//! settlement scheduler catches them per account and logs them, and request
//! handlers map them to user-facing messages.

use crate::core::money::format_cents;
use crate::entities::AccountStatus;
use sea_orm::DbErr;
use thiserror::Error;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn dollars(cents: &i64) -> String {
    format_cents(*cents)
}

/// Every error the engine can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input: missing field, invalid date, unsupported combination.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A monetary amount that is zero, negative or otherwise unusable (in cents).
    #[error("Invalid amount: {}", dollars(.amount))]
    InvalidAmount {
        /// The rejected amount in cents
        amount: i64,
    },

    /// Business-rule rejection: the account cannot cover the requested amount.
    #[error("Insufficient funds: available {}, required {}", dollars(.available), dollars(.required))]
    InsufficientFunds {
        /// Available (approved) balance in cents
        available: i64,
        /// Requested amount in cents
        required: i64,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record, e.g. `"account"`
        entity: &'static str,
        /// Identifier that was looked up
        id: i64,
    },

    /// A lifecycle manager refused a state change.
    #[error("Account {account_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The account whose status was to change
        account_id: i64,
        /// Status found in storage
        from: AccountStatus,
        /// Status that was requested
        to: AccountStatus,
    },

    /// Stored data contradicts an engine invariant. Indicates corruption.
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken invariant
        message: String,
    },

    /// Storage failure. Any open storage transaction is rolled back.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What failed while loading configuration
        message: String,
    },

    /// I/O failure outside the database.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::InvariantViolation`].
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// True when the error signals corrupted data rather than bad input.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
