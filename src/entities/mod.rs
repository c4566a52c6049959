//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod enums;
pub mod gic_product;
pub mod lookup_code;
pub mod system_state;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use enums::{
    AccountStatus, AccountType, LookupVocabulary, PaymentFrequency, TransactionStatus,
    TransactionType, UserRole,
};
pub use gic_product::{
    Column as GicProductColumn, Entity as GicProduct, Model as GicProductModel,
};
pub use lookup_code::{Column as LookupCodeColumn, Entity as LookupCode, Model as LookupCodeModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
