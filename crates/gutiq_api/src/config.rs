//! Environment-driven configuration for the request/response boundary.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - Reading configuration never touches the database or the logger.

use gutiq_core::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "GUTIQ_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "GUTIQ_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "GUTIQ_LOG_DIR";
const DEFAULT_DB_FILE_NAME: &str = "gutiq.sqlite3";

/// Resolved boundary configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Log level passed to `gutiq_core::init_logging`.
    pub log_level: String,
    /// Absolute log directory; logging stays off when `None`.
    pub log_dir: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV),
        }
    }
}
