//! Task board domain model.
//!
//! # Responsibility
//! - Define the canonical category/task records and the root `AppState`.
//! - Own the pure validation rules every write path must pass.
//!
//! # Invariants
//! - Every category and task is identified by a stable, never-reused id.
//! - Names and titles are stored trimmed and within their length bounds.
//! - Every task references an existing category.

pub mod category;
pub mod id;
pub mod state;
pub mod task;
pub mod validation;
