/// Database connection, schema creation and lookup-code validation
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;
