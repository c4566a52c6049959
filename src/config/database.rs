//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Two things cannot be expressed on the entities and are added here: the
//! partial unique index that allows one chequing account per user, and the
//! `lookup_codes` rows mirroring the closed enumerations.

use crate::entities::{
    Account, AccountType, GicProduct, LookupCode, SystemState, Transaction, User, enums, lookup_code,
};
use crate::errors::{Error, Result};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, Schema, Set,
};
use tracing::{debug, info};

/// Gets the database URL, preferring the `DATABASE_URL` environment variable over
/// the configured value.
#[must_use]
pub fn get_database_url(configured: &str) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| configured.to_string())
}

/// Establishes a connection to the database.
///
/// `DATABASE_URL` in the environment overrides `configured`.
pub async fn create_connection(configured: &str) -> Result<DatabaseConnection> {
    let database_url = get_database_url(configured);
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .filter(|path| !path.is_empty())
    {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let db = Database::connect(&database_url).await?;
    info!("Connected to database");
    Ok(db)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Safe to run on every startup: existing tables and indexes are left alone.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut user_table = schema.create_table_from_entity(User);
    let mut account_table = schema.create_table_from_entity(Account);
    let mut transaction_table = schema.create_table_from_entity(Transaction);
    let mut gic_product_table = schema.create_table_from_entity(GicProduct);
    let mut system_state_table = schema.create_table_from_entity(SystemState);
    let mut lookup_code_table = schema.create_table_from_entity(LookupCode);

    db.execute(builder.build(user_table.if_not_exists())).await?;
    db.execute(builder.build(account_table.if_not_exists())).await?;
    db.execute(builder.build(transaction_table.if_not_exists())).await?;
    db.execute(builder.build(gic_product_table.if_not_exists())).await?;
    db.execute(builder.build(system_state_table.if_not_exists())).await?;
    db.execute(builder.build(lookup_code_table.if_not_exists())).await?;

    db.execute_unprepared(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_one_chequing_per_user \
         ON accounts (user_id) WHERE account_type = {}",
        AccountType::Chequing.to_value()
    ))
    .await?;
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_lookup_codes_domain_code \
         ON lookup_codes (domain, code)",
    )
    .await?;

    debug!("Database schema is in place");
    Ok(())
}

/// Writes the compiled-in vocabularies to `lookup_codes` and checks the rows that
/// already exist.
///
/// Missing rows are inserted. A stored row whose name differs from the compiled-in
/// label means the database was written by an incompatible version; that is an
/// invariant violation and startup must stop. Returns the number of rows inserted.
pub async fn sync_lookup_codes<C>(db: &C) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut inserted = 0;
    for (domain, rows) in enums::all_lookup_tables() {
        for (code, name) in rows {
            let existing = LookupCode::find()
                .filter(lookup_code::Column::Domain.eq(domain))
                .filter(lookup_code::Column::Code.eq(code))
                .one(db)
                .await?;

            match existing {
                Some(row) if row.name == name => {}
                Some(row) => {
                    return Err(Error::invariant(format!(
                        "lookup code {domain}/{code} is '{}' in the database but '{name}' in this build",
                        row.name
                    )));
                }
                None => {
                    lookup_code::ActiveModel {
                        domain: Set(domain.to_string()),
                        code: Set(code),
                        name: Set(name.to_string()),
                        ..Default::default()
                    }
                    .insert(db)
                    .await?;
                    inserted += 1;
                }
            }
        }
    }

    if inserted > 0 {
        info!("Inserted {} lookup codes", inserted);
    }
    Ok(inserted)
}
