/// Account storage: creation, lookup and guarded status changes
pub mod account;
/// Pure interest, payment and date arithmetic
pub mod calculator;
/// GIC products, purchases and maturity
pub mod gic;
/// Append-only ledger and derived balances
pub mod ledger;
/// Loan lifecycle: request, approval, disbursement, interest, payoff and maturity
pub mod loan;
/// Cent/dollar conversion and formatting
pub mod money;
/// Read-only account reports
pub mod report;
/// Daily settlement batch and scheduler
pub mod settlement;
/// Balanced two-leg transfers
pub mod transfer;
/// User registry
pub mod user;
