/// Database connection and schema bootstrap
pub mod database;

/// Seed catalog loading from a TOML file
pub mod catalog;

/// Backend URL, API key and local paths from environment variables
pub mod settings;
