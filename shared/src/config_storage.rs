//! User-scoped storage for station state.
//!
//! Everything the station persists lives in one directory, by default
//! `$XDG_CACHE_HOME/field-station` or `~/.cache/field-station`:
//!
//! - `results_cache.json` - undelivered results
//! - `throw_log.jsonl` - one line per measured throw
//! - `station_settings.json` - optional overrides for timing and tolerances

use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Sub-directory created under the user cache directory.
const APP_DIR: &str = "field-station";

const RESULT_CACHE_FILE: &str = "results_cache.json";
const THROW_LOG_FILE: &str = "throw_log.jsonl";
const SETTINGS_FILE: &str = "station_settings.json";

/// Storage layout rooted at a single directory.
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    root_path: PathBuf,
}

impl ConfigStorage {
    /// Storage under the user cache directory.
    pub fn new() -> std::io::Result<Self> {
        let base = match std::env::var_os("XDG_CACHE_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var_os("HOME").ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set")
                })?;
                PathBuf::from(home).join(".cache")
            }
        };
        Ok(Self {
            root_path: base.join(APP_DIR),
        })
    }

    /// Storage rooted at a custom directory
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn result_cache_path(&self) -> PathBuf {
        self.root_path.join(RESULT_CACHE_FILE)
    }

    pub fn throw_log_path(&self) -> PathBuf {
        self.root_path.join(THROW_LOG_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root_path.join(SETTINGS_FILE)
    }

    /// Create the root directory if needed.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root_path)
    }

    /// Load a JSON document from the root directory.
    ///
    /// Returns None if the file doesn't exist.
    /// Returns Some(Err) if the file exists but cannot be loaded.
    pub fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Option<std::io::Result<T>> {
        let path = self.root_path.join(file_name);
        if !path.exists() {
            return None;
        }

        Some(std::fs::read_to_string(&path).and_then(|json| {
            serde_json::from_str(&json)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }))
    }

    /// Save a JSON document into the root directory, returning its path.
    pub fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> std::io::Result<PathBuf> {
        self.ensure_root()?;
        let path = self.root_path.join(file_name);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// File name (relative to the root) of the settings document.
    pub fn settings_file_name() -> &'static str {
        SETTINGS_FILE
    }
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".").join(APP_DIR)))
    }
}
