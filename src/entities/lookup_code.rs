//! Lookup code entity - persisted copy of the closed enumerations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One `(domain, code, name)` row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lookup_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Vocabulary name, e.g. `"account_types"`
    pub domain: String,
    /// Integer code used in the data tables
    pub code: i32,
    /// Label for the code
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
