//! Root aggregate persisted as one blob.
//!
//! # Responsibility
//! - Hold schema metadata, categories and tasks in insertion order.
//! - Provide lookup helpers used by validation and queries.
//!
//! # Invariants
//! - `meta.version` equals `CURRENT_SCHEMA_VERSION` after migration.
//! - `meta.collapsed_by_category_id` never keeps entries for deleted categories.
//! - Absence of a collapse entry means "not collapsed".

use crate::model::category::Category;
use crate::model::task::Task;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Persisted metadata section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub version: u32,
    #[serde(default)]
    pub collapsed_by_category_id: BTreeMap<String, bool>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            collapsed_by_category_id: BTreeMap::new(),
        }
    }
}

/// Whole-application state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub meta: Meta,
    pub categories: Vec<Category>,
    pub tasks: Vec<Task>,
}

impl AppState {
    /// Returns a fresh, empty state at the current schema version.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn find_category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn has_category(&self, id: &str) -> bool {
        self.find_category(id).is_some()
    }

    /// Lower-cased category names, optionally excluding one category id.
    ///
    /// Used as the uniqueness set for name validation; the excluded id is the
    /// category being renamed.
    pub fn category_names_lowercase(&self, excluding: Option<&str>) -> HashSet<String> {
        self.categories
            .iter()
            .filter(|category| Some(category.id.as_str()) != excluding)
            .map(|category| category.name.trim().to_lowercase())
            .collect()
    }

    /// Next insertion rank for a new category.
    ///
    /// Saturates at `i64::MAX`; equal ranks then fall back to `created_at`.
    pub fn next_category_order(&self) -> i64 {
        self.categories
            .iter()
            .map(|category| category.order)
            .max()
            .map_or(0, |max| max.saturating_add(1))
    }

    pub fn is_collapsed(&self, category_id: &str) -> bool {
        self.meta
            .collapsed_by_category_id
            .get(category_id)
            .copied()
            .unwrap_or(false)
    }
}
