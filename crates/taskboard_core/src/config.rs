//! Runtime configuration for hosting the task board core.
//!
//! # Responsibility
//! - Resolve storage location, storage key and logging settings.
//! - Read overrides from `TASKBOARD_*` environment variables.
//!
//! # Invariants
//! - Blank environment values are ignored and fall back to defaults.
//! - Resolution never fails; validation of paths happens at use sites.

use crate::logging::default_log_level;
use crate::repo::state_gateway::DEFAULT_STORAGE_KEY;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "TASKBOARD_DB_PATH";
pub const ENV_STORAGE_KEY: &str = "TASKBOARD_STORAGE_KEY";
pub const ENV_LOG_LEVEL: &str = "TASKBOARD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TASKBOARD_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "taskboard.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "taskboard-logs";

/// Resolved host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// SQLite file backing the key-value store.
    pub db_path: PathBuf,
    /// Key the state blob is stored under.
    pub storage_key: String,
    pub log_level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let base = std::env::temp_dir();
        Self {
            db_path: base.join(DEFAULT_DB_FILE_NAME),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: base.join(DEFAULT_LOG_DIR_NAME),
        }
    }
}

impl BoardConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by the given variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(key) = read(ENV_STORAGE_KEY) {
            config.storage_key = key;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        config
    }
}
