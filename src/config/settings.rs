//! Runtime settings read from the environment (and `.env` via `dotenvy`).
//!
//! Missing values are not fatal: each one logs a warning and falls back to a
//! local default so the application always starts.

use super::database::DEFAULT_DATABASE_URL;
use std::path::PathBuf;
use tracing::warn;

/// Environment variable holding the backend URL
pub const BACKEND_URL_VAR: &str = "BACKEND_URL";
/// Environment variable holding the public API key
pub const BACKEND_API_KEY_VAR: &str = "BACKEND_API_KEY";
/// Environment variable naming an optional seed catalog
pub const CATALOG_PATH_VAR: &str = "CATALOG_PATH";
/// Environment variable naming the local key-value storage file
pub const STORAGE_PATH_VAR: &str = "STORAGE_PATH";

const DEFAULT_STORAGE_PATH: &str = "data/local_storage.json";

/// Settings the composition root needs to wire the application together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Backend connection URL
    pub backend_url: String,
    /// Public API key, `None` means anonymous access
    pub api_key: Option<String>,
    /// TOML catalog loaded into an empty backend at startup
    pub catalog_path: Option<PathBuf>,
    /// File backing the local key-value store
    pub storage_path: PathBuf,
}

impl Settings {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, treating blank values as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend_url = get(BACKEND_URL_VAR).unwrap_or_else(|| {
            warn!(
                "{} is not set; falling back to local backend {}",
                BACKEND_URL_VAR, DEFAULT_DATABASE_URL
            );
            DEFAULT_DATABASE_URL.to_string()
        });

        let api_key = get(BACKEND_API_KEY_VAR);
        if api_key.is_none() {
            warn!(
                "{} is not set; backend requests are anonymous",
                BACKEND_API_KEY_VAR
            );
        }

        Self {
            backend_url,
            api_key,
            catalog_path: get(CATALOG_PATH_VAR).map(PathBuf::from),
            storage_path: get(STORAGE_PATH_VAR)
                .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from),
        }
    }
}
