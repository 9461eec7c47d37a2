//! Task domain record.
//!
//! # Invariants
//! - `category_id` references an existing category and never changes.
//! - `title` is trimmed and 2..=140 chars.
//! - `updated_at` is refreshed on every mutation of the task.

use crate::model::id::{uid, CategoryId, TaskId, TASK_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Single actionable item inside a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub category_id: CategoryId,
    pub title: String,
    pub done: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Task {
    /// Creates an open task with a freshly generated id.
    pub fn new(category_id: impl Into<CategoryId>, title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: uid(TASK_ID_PREFIX),
            category_id: category_id.into(),
            title: title.into(),
            done: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Flips completion state and refreshes `updated_at`.
    pub fn toggle(&mut self, now_ms: i64) {
        self.done = !self.done;
        self.updated_at = now_ms;
    }

    /// Replaces the title and refreshes `updated_at`.
    pub fn rename(&mut self, title: impl Into<String>, now_ms: i64) {
        self.title = title.into();
        self.updated_at = now_ms;
    }

    /// List ordering: open tasks first, then by `created_at` ascending.
    pub fn list_cmp(&self, other: &Self) -> Ordering {
        self.done
            .cmp(&other.done)
            .then(self.created_at.cmp(&other.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use std::cmp::Ordering;

    #[test]
    fn new_task_starts_open_with_equal_timestamps() {
        let task = Task::new("cat_1", "Wash dishes", 1_000);
        assert!(!task.done);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.id.starts_with("task_"));
    }

    #[test]
    fn toggle_flips_only_own_flag() {
        let mut task = Task::new("cat_1", "Wash dishes", 1_000);
        task.toggle(2_000);
        assert!(task.done);
        assert_eq!(task.updated_at, 2_000);
        task.toggle(3_000);
        assert!(!task.done);
        assert_eq!(task.created_at, 1_000);
    }

    #[test]
    fn open_tasks_sort_before_done_tasks() {
        let mut older_done = Task::new("cat_1", "older", 1);
        older_done.done = true;
        let newer_open = Task::new("cat_1", "newer", 2);
        assert_eq!(newer_open.list_cmp(&older_done), Ordering::Less);
    }
}
