//! Core state management for the task board.
//! This crate is the single source of truth for board invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BoardConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::category::Category;
pub use model::id::{uid, CategoryId, TaskId};
pub use model::state::{AppState, Meta, CURRENT_SCHEMA_VERSION};
pub use model::task::Task;
pub use model::validation::{
    validate_category_name, validate_task_title, ValidationError, ValidationField,
    ValidationResult,
};
pub use repo::kv_repo::{
    KvRepository, MemoryKvRepository, SqliteKvRepository, StorageError, StorageResult,
};
pub use repo::state_gateway::{
    migrate, PersistenceGateway, Subscriber, Subscription, DEFAULT_STORAGE_KEY,
};
pub use service::board_service::{BoardService, CategoryProgress};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
