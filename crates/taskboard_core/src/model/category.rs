//! Category domain record.
//!
//! # Invariants
//! - `id` is generated once and never changes.
//! - `name` is trimmed, 2..=40 chars, unique case-insensitively.
//! - `order` strictly determines display order; ties fall back to `created_at`.

use crate::model::id::{uid, CategoryId, CATEGORY_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Named bucket that owns a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Insertion rank. Values need not be contiguous.
    pub order: i64,
}

impl Category {
    /// Creates a category with a freshly generated id.
    ///
    /// Callers are expected to pass an already validated, trimmed name.
    pub fn new(name: impl Into<String>, created_at: i64, order: i64) -> Self {
        Self {
            id: uid(CATEGORY_ID_PREFIX),
            name: name.into(),
            created_at,
            order,
        }
    }

    /// Display ordering: `order` ascending, then `created_at` ascending.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then(self.created_at.cmp(&other.created_at))
    }
}
