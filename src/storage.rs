//! Persisted client-side state.
//!
//! A flat JSON object in one file, read and rewritten whole on every access.
//! Anything that cannot be read (missing file, bad JSON, a value of the
//! wrong shape) is treated as absent.

use crate::errors::Result;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key of the remember-me flag
pub const REMEMBER_ME_KEY: &str = "rememberMe";
/// Key of the last known user location
pub const USER_LOCATION_KEY: &str = "userLocation";

/// Last known position of the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Human-readable address, when one was resolved
    #[serde(default)]
    pub address: Option<String>,
}

impl SavedLocation {
    /// The position without the address.
    #[must_use]
    pub const fn coordinates(&self) -> crate::geo::Coordinates {
        crate::geo::Coordinates::new(self.latitude, self.longitude)
    }
}

/// Key-value storage backed by one JSON file.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Uses the file at `path`, which need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `key`, or `None` when it is missing or unreadable.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.load().remove(key)?;
        serde_json::from_value(value)
            .inspect_err(|e| warn!("Ignoring stored `{}`: {}", key, e))
            .ok()
    }

    /// Stores `value` under `key`, rewriting the file.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut entries = self.load();
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.save(&entries)
    }

    /// Deletes `key` if present.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    /// The remember-me flag, `false` when unset.
    #[must_use]
    pub fn remember_me(&self) -> bool {
        self.get(REMEMBER_ME_KEY).unwrap_or(false)
    }

    /// Stores the remember-me flag.
    pub fn set_remember_me(&self, remember: bool) -> Result<()> {
        self.set(REMEMBER_ME_KEY, &remember)
    }

    /// The last known location, ignoring out-of-range coordinates.
    #[must_use]
    pub fn user_location(&self) -> Option<SavedLocation> {
        self.get::<SavedLocation>(USER_LOCATION_KEY)
            .filter(|location| location.coordinates().is_valid())
    }

    /// Stores the last known location.
    pub fn set_user_location(&self, location: &SavedLocation) -> Result<()> {
        self.set(USER_LOCATION_KEY, location)
    }

    fn load(&self) -> Map<String, Value> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No local storage at {}: {}", self.path.display(), e);
                return Map::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(Value::Object(entries)) => entries,
            _ => {
                warn!(
                    "Local storage at {} is not a JSON object, starting empty",
                    self.path.display()
                );
                Map::new()
            }
        }
    }

    fn save(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}
