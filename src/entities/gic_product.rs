//! GIC product entity - admin-configured investment templates.
//!
//! Purchasing a product copies its rate and term onto a new investment account,
//! so editing a product never changes investments that already exist.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// GIC product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gic_products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "1 Year GIC")
    pub name: String,
    /// Annual rate in percent, compounded monthly
    pub interest_rate: f64,
    /// Term length in months
    pub term_months: i32,
    /// Smallest purchasable amount in cents
    pub minimum_amount: i64,
    /// Soft delete flag - if true, product is hidden but data is preserved
    pub is_deleted: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// `GicProduct` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
