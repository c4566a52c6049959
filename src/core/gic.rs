//! GIC product catalogue and GIC lifecycle manager.
//!
//! Products are admin-maintained offers (rate, term, minimum). Buying one creates
//! an `Investment` account that snapshots the product's terms, so later product
//! edits never change an existing certificate. GICs are `Active` from purchase
//! until maturity, when they are paid out and `Closed`.

use crate::{
    config::settings::GicProductConfig,
    core::{
        account::{self, NewAccount, term_of},
        calculator, ledger,
        ledger::BalanceFilter,
        money,
        transfer::{self, TransferRequest},
    },
    entities::{
        AccountStatus, AccountType, GicProduct, PaymentFrequency, TransactionType,
        account as account_entity, gic_product,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, warn};

fn validate_product(name: &str, interest_rate: f64, term_months: u32, minimum_amount: i64) -> Result<i32> {
    if name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    if !interest_rate.is_finite() || interest_rate < 0.0 {
        return Err(Error::validation(format!("invalid interest rate {interest_rate}")));
    }
    if term_months == 0 {
        return Err(Error::validation("GIC term must be at least one month"));
    }
    if minimum_amount < 0 {
        return Err(Error::InvalidAmount {
            amount: minimum_amount,
        });
    }
    i32::try_from(term_months)
        .map_err(|_| Error::validation(format!("GIC term {term_months} is too long")))
}

/// Retrieves all active (non-deleted) products, ordered alphabetically by name.
pub async fn get_all_active_products<C>(conn: &C) -> Result<Vec<gic_product::Model>>
where
    C: ConnectionTrait,
{
    GicProduct::find()
        .filter(gic_product::Column::IsDeleted.eq(false))
        .order_by_asc(gic_product::Column::Name)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Finds an active product by name.
pub async fn get_product_by_name<C>(conn: &C, name: &str) -> Result<Option<gic_product::Model>>
where
    C: ConnectionTrait,
{
    GicProduct::find()
        .filter(gic_product::Column::Name.eq(name))
        .filter(gic_product::Column::IsDeleted.eq(false))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by its unique ID, deleted or not.
pub async fn get_product_by_id<C>(conn: &C, product_id: i64) -> Result<Option<gic_product::Model>>
where
    C: ConnectionTrait,
{
    GicProduct::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

async fn get_active_product<C>(conn: &C, product_id: i64) -> Result<gic_product::Model>
where
    C: ConnectionTrait,
{
    get_product_by_id(conn, product_id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or(Error::NotFound {
            entity: "GIC product",
            id: product_id,
        })
}

/// Creates a new product.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The rate is negative or not finite
/// - The term is zero or the minimum amount negative
/// - The database insert fails
pub async fn create_product<C>(
    conn: &C,
    name: &str,
    interest_rate: f64,
    term_months: u32,
    minimum_amount: i64,
) -> Result<gic_product::Model>
where
    C: ConnectionTrait,
{
    let term = validate_product(name, interest_rate, term_months, minimum_amount)?;
    let now = chrono::Utc::now().naive_utc();

    let product = gic_product::ActiveModel {
        name: Set(name.trim().to_string()),
        interest_rate: Set(interest_rate),
        term_months: Set(term),
        minimum_amount: Set(minimum_amount),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = product.insert(conn).await?;
    info!(
        "Created GIC product {} '{}' ({}% for {} months, minimum {})",
        created.id,
        created.name,
        created.interest_rate,
        created.term_months,
        money::format_cents(created.minimum_amount)
    );
    Ok(created)
}

/// Updates the terms of an active product. Certificates already sold keep
/// their snapshot.
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    name: &str,
    interest_rate: f64,
    term_months: u32,
    minimum_amount: i64,
) -> Result<gic_product::Model> {
    let term = validate_product(name, interest_rate, term_months, minimum_amount)?;

    let mut product: gic_product::ActiveModel = get_active_product(db, product_id).await?.into();
    product.name = Set(name.trim().to_string());
    product.interest_rate = Set(interest_rate);
    product.term_months = Set(term);
    product.minimum_amount = Set(minimum_amount);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

/// Soft deletes a product. It can no longer be purchased.
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<gic_product::Model> {
    let mut product: gic_product::ActiveModel = get_active_product(db, product_id).await?.into();
    product.is_deleted = Set(true);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    let deleted = product.update(db).await?;
    info!("Deleted GIC product {} '{}'", deleted.id, deleted.name);
    Ok(deleted)
}

/// Inserts every configured product whose name is not already on offer.
/// Returns how many were created.
pub async fn seed_products(db: &DatabaseConnection, products: &[GicProductConfig]) -> Result<usize> {
    let mut created = 0;
    for config in products {
        if get_product_by_name(db, config.name.trim()).await?.is_some() {
            continue;
        }
        create_product(
            db,
            &config.name,
            config.interest_rate,
            config.term_months,
            money::to_cents(config.minimum_amount),
        )
        .await?;
        created += 1;
    }
    Ok(created)
}

/// Buys a GIC with money from the user's chequing account.
///
/// The investment account and the transfer that funds it are written in one
/// storage transaction. The funds check runs before it opens.
pub async fn purchase_gic(
    db: &DatabaseConnection,
    user_id: i64,
    chequing_account_id: i64,
    product_id: i64,
    amount: i64,
    today: NaiveDate,
) -> Result<account_entity::Model> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let product = get_active_product(db, product_id).await?;
    if amount < product.minimum_amount {
        return Err(Error::validation(format!(
            "{} is below the minimum of {} for {}",
            money::format_cents(amount),
            money::format_cents(product.minimum_amount),
            product.name
        )));
    }

    let chequing = account::get_account(db, chequing_account_id).await?;
    if chequing.user_id != user_id || chequing.account_type != AccountType::Chequing {
        return Err(Error::validation(format!(
            "account {chequing_account_id} is not the chequing account of user {user_id}"
        )));
    }
    if chequing.status != AccountStatus::Active {
        return Err(Error::validation(format!(
            "chequing account {chequing_account_id} is {}",
            chequing.status
        )));
    }

    let available = ledger::get_balance(db, chequing_account_id, BalanceFilter::Approved).await?;
    if available < amount {
        return Err(Error::InsufficientFunds {
            available,
            required: amount,
        });
    }

    let txn = db.begin().await?;
    let gic = account::create_account(
        &txn,
        user_id,
        NewAccount {
            account_type: AccountType::Investment,
            status: AccountStatus::Active,
            principal: amount,
            interest_rate: product.interest_rate,
            term_months: product.term_months,
            start_date: today,
            payment_frequency: Some(PaymentFrequency::AtMaturity),
            description: product.name.clone(),
            gic_product_id: Some(product.id),
        },
    )
    .await?;
    let request = TransferRequest::new(chequing_account_id, gic.id, amount, today)
        .with_descriptions(format!("Purchase of {}", product.name), "GIC purchase");
    transfer::execute_transfer(&txn, request).await?;
    txn.commit().await?;

    info!(
        "User {} bought GIC {} ({}) for {}",
        user_id,
        gic.id,
        product.name,
        money::format_cents(amount)
    );
    Ok(gic)
}

/// Loads an account and checks that it is an investment.
pub async fn get_gic<C>(conn: &C, gic_id: i64) -> Result<account_entity::Model>
where
    C: ConnectionTrait,
{
    let gic = account::get_account(conn, gic_id).await?;
    if !gic.is_investment() {
        return Err(Error::validation(format!(
            "account {gic_id} is a {} account, not a GIC",
            gic.account_type
        )));
    }
    Ok(gic)
}

/// Value of the certificate at maturity, in cents.
pub fn maturity_value(gic: &account_entity::Model) -> Result<i64> {
    Ok(money::to_cents(calculator::gic_maturity_value(
        money::to_dollars(gic.principal),
        gic.interest_rate,
        term_of(gic)?,
    )))
}

/// Pays out a GIC that reached maturity.
///
/// In one storage transaction: the compounded interest is credited to the
/// investment account, its whole balance is moved to the owner's chequing account
/// and the GIC is `Closed`. Returns the amount paid out, or `None` when the GIC
/// is not active or not yet mature.
pub async fn check_maturity(
    db: &DatabaseConnection,
    gic_id: i64,
    today: NaiveDate,
) -> Result<Option<i64>> {
    let gic = get_gic(db, gic_id).await?;
    if gic.status != AccountStatus::Active
        || !calculator::has_reached_maturity(gic.start_date, term_of(&gic)?, today)
    {
        return Ok(None);
    }

    let value = maturity_value(&gic)?;
    let balance = ledger::get_balance(db, gic_id, BalanceFilter::Approved).await?;
    if balance != gic.principal {
        warn!(
            "GIC {} holds {} but its principal is {}",
            gic_id,
            money::format_cents(balance),
            money::format_cents(gic.principal)
        );
    }
    let interest = value - balance;
    if interest < 0 {
        return Err(Error::invariant(format!(
            "GIC {gic_id} holds more than its maturity value"
        )));
    }
    let chequing = account::find_chequing(db, gic.user_id)
        .await?
        .ok_or_else(|| {
            Error::invariant(format!(
                "user {} has GIC {} but no chequing account",
                gic.user_id, gic_id
            ))
        })?;

    let txn = db.begin().await?;
    if !account::compare_and_set_status(&txn, gic_id, AccountStatus::Active, AccountStatus::Closed)
        .await?
    {
        return Ok(None);
    }
    if interest > 0 {
        transfer::create_system_transaction(
            &txn,
            gic_id,
            TransactionType::Deposit,
            interest,
            today,
            "Interest at maturity",
        )
        .await?;
    }
    if value > 0 {
        let request = TransferRequest::new(gic_id, chequing.id, value, today)
            .with_descriptions("Maturity payout", format!("{} matured", gic.description));
        transfer::execute_transfer(&txn, request).await?;
    } else {
        debug!("GIC {} matured with zero value; closing without a payout", gic_id);
    }
    txn.commit().await?;

    info!(
        "GIC {} matured: paid {} (interest {}) to chequing account {}",
        gic_id,
        money::format_cents(value),
        money::format_cents(interest),
        chequing.id
    );
    Ok(Some(value))
}
