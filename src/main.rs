use chrono::Local;
use classbank::{
    config::{database, settings},
    core::{gic, settlement},
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let settings = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    let options = settings.settlement.options();

    // 4. Connect, create the schema and check the stored vocabularies
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    database::sync_lookup_codes(&db)
        .await
        .inspect_err(|e| error!("Stored lookup codes do not match this build: {}", e))?;

    // 5. Seed configured GIC products
    gic::seed_products(&db, &settings.gic_products).await?;

    // 6. Settle any days missed while the service was down
    let reports = settlement::catch_up(&db, Local::now().date_naive(), &options).await?;
    info!("Startup catch-up settled {} day(s)", reports.len());

    // 7. Run the nightly scheduler until interrupted
    tokio::select! {
        () = settlement::run_scheduler(&db, options) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown requested");
        }
    }

    db.close().await?;
    Ok(())
}
