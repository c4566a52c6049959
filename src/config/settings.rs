//! Application settings loaded from config.toml
//!
//! The file is optional. Every section has defaults, so an empty or missing file
//! yields a working configuration. `DATABASE_URL` in the environment takes
//! precedence over `database_url` here (see [`super::database::get_database_url`]).

use crate::core::settlement::SettlementOptions;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Default `SQLite` database used when nothing else is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/classbank.sqlite?mode=rwc";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Database connection string
    pub database_url: String,
    /// Daily settlement tuning
    pub settlement: SettlementSettings,
    /// GIC products to seed on startup
    pub gic_products: Vec<GicProductConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            settlement: SettlementSettings::default(),
            gic_products: Vec::new(),
        }
    }
}

/// `[settlement]` section
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SettlementSettings {
    /// A loan owing at most this many cents is considered paid off
    pub payoff_tolerance_cents: i64,
    /// How many missed days a catch-up run settles at most
    pub max_catch_up_days: u32,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        let options = SettlementOptions::default();
        Self {
            payoff_tolerance_cents: options.payoff_tolerance_cents,
            max_catch_up_days: options.max_catch_up_days,
        }
    }
}

impl SettlementSettings {
    /// Options for the settlement scheduler.
    #[must_use]
    pub const fn options(&self) -> SettlementOptions {
        SettlementOptions {
            payoff_tolerance_cents: self.payoff_tolerance_cents,
            max_catch_up_days: self.max_catch_up_days,
        }
    }
}

/// Configuration for a single `[[gic_products]]` entry
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GicProductConfig {
    /// Product name, unique among active products
    pub name: String,
    /// Annual rate in percent
    pub interest_rate: f64,
    /// Term in months
    pub term_months: u32,
    /// Minimum purchase in dollars
    pub minimum_amount: f64,
}

impl Settings {
    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config {
                message: "database_url cannot be empty".to_string(),
            });
        }
        if self.settlement.payoff_tolerance_cents < 0 {
            return Err(Error::Config {
                message: "settlement.payoff_tolerance_cents cannot be negative".to_string(),
            });
        }
        for product in &self.gic_products {
            if product.name.trim().is_empty() {
                return Err(Error::Config {
                    message: "GIC product name cannot be empty".to_string(),
                });
            }
            if !product.interest_rate.is_finite() || product.interest_rate < 0.0 {
                return Err(Error::Config {
                    message: format!("GIC product '{}' has an invalid rate", product.name),
                });
            }
            if product.term_months == 0 {
                return Err(Error::Config {
                    message: format!("GIC product '{}' has a zero term", product.name),
                });
            }
            if !product.minimum_amount.is_finite() || product.minimum_amount < 0.0 {
                return Err(Error::Config {
                    message: format!(
                        "GIC product '{}' has an invalid minimum amount",
                        product.name
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Loads and validates settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let settings: Settings = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from ./config.toml, falling back to defaults when the file does
/// not exist.
pub fn load_default_config() -> Result<Settings> {
    if !Path::new(DEFAULT_CONFIG_PATH).exists() {
        info!("No {} found, using default settings", DEFAULT_CONFIG_PATH);
        return Ok(Settings::default());
    }
    load_config(DEFAULT_CONFIG_PATH)
}
