//! Task board state model.
//!
//! # Responsibility
//! - Hold the current `AppState` snapshot and answer sorted read queries.
//! - Validate command input, build the next snapshot and hand it to the
//!   persistence gateway.
//!
//! # Invariants
//! - Snapshots are replaced wholesale; a snapshot handed out by `state()` is
//!   never mutated afterwards.
//! - Every task references an existing category: `add_task` rejects unknown
//!   category ids and `remove_category` cascades.
//! - Commands targeting an absent id succeed without writing or notifying.
//! - A failed durable write keeps the new in-memory snapshot; the failure is
//!   logged by the gateway, subscribers are not notified and `is_persisted`
//!   reports `false` until a later write succeeds.

use crate::clock::{Clock, SystemClock};
use crate::model::category::Category;
use crate::model::id::{CategoryId, TaskId};
use crate::model::state::AppState;
use crate::model::task::Task;
use crate::model::validation::{
    validate_category_name, validate_task_title, ValidationError, ValidationResult,
};
use crate::repo::kv_repo::KvRepository;
use crate::repo::state_gateway::{PersistenceGateway, Subscriber, Subscription};
use log::{debug, info, warn};
use std::rc::Rc;

/// Completion counters for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryProgress {
    pub done: usize,
    pub total: usize,
}

/// State model facade consumed by the render layer.
pub struct BoardService<R: KvRepository, C: Clock = SystemClock> {
    gateway: PersistenceGateway<R>,
    clock: C,
    state: Rc<AppState>,
    persisted: bool,
}

impl<R: KvRepository> BoardService<R, SystemClock> {
    /// Creates a service on the wall clock and loads the persisted state.
    pub fn new(gateway: PersistenceGateway<R>) -> Self {
        Self::with_clock(gateway, SystemClock)
    }
}

impl<R: KvRepository, C: Clock> BoardService<R, C> {
    /// Creates a service with an explicit time source and loads the
    /// persisted state.
    pub fn with_clock(gateway: PersistenceGateway<R>, clock: C) -> Self {
        let state = Rc::new(gateway.load());
        Self {
            gateway,
            clock,
            state,
            persisted: true,
        }
    }

    pub fn gateway(&self) -> &PersistenceGateway<R> {
        &self.gateway
    }

    /// Registers a callback fired after every persisted mutation.
    pub fn subscribe(&self, subscriber: Subscriber) -> Subscription {
        self.gateway.subscribe(subscriber)
    }

    /// Whether the last committed snapshot reached durable storage.
    ///
    /// `true` until the first failed write; reset by the next successful one.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Current snapshot.
    pub fn state(&self) -> Rc<AppState> {
        Rc::clone(&self.state)
    }

    /// All categories ordered by `order`, ties by `created_at`.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories = self.state.categories.clone();
        categories.sort_by(Category::display_cmp);
        categories
    }

    /// Tasks of one category: open before done, each group oldest first.
    pub fn tasks_by_category(&self, category_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .state
            .tasks
            .iter()
            .filter(|task| task.category_id == category_id)
            .cloned()
            .collect();
        tasks.sort_by(Task::list_cmp);
        tasks
    }

    pub fn category(&self, id: &str) -> Option<Category> {
        self.state.find_category(id).cloned()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.state.find_task(id).cloned()
    }

    pub fn is_collapsed(&self, category_id: &str) -> bool {
        self.state.is_collapsed(category_id)
    }

    pub fn category_progress(&self, category_id: &str) -> CategoryProgress {
        self.state
            .tasks
            .iter()
            .filter(|task| task.category_id == category_id)
            .fold(CategoryProgress::default(), |mut progress, task| {
                progress.total += 1;
                if task.done {
                    progress.done += 1;
                }
                progress
            })
    }

    /// Appends a category with the next display rank.
    ///
    /// # Errors
    /// - `InvalidLength` / `DuplicateName` from name validation.
    pub fn add_category(&mut self, name: &str) -> ValidationResult<CategoryId> {
        let existing = self.state.category_names_lowercase(None);
        validate_category_name(name, &existing)
            .inspect_err(|err| log_rejected("category_add", err))?;

        let mut next = self.next_state();
        let category = Category::new(
            name.trim(),
            self.clock.now_ms(),
            next.next_category_order(),
        );
        let category_id = category.id.clone();
        next.categories.push(category);
        self.commit(next);

        info!("event=category_add module=service status=ok category_id={category_id}");
        Ok(category_id)
    }

    /// Renames a category in place.
    ///
    /// # Errors
    /// - `InvalidLength` / `DuplicateName`; the category's own current name
    ///   does not count as a duplicate.
    pub fn rename_category(&mut self, id: &str, name: &str) -> ValidationResult<()> {
        let existing = self.state.category_names_lowercase(Some(id));
        validate_category_name(name, &existing)
            .inspect_err(|err| log_rejected("category_rename", err))?;
        if !self.state.has_category(id) {
            log_noop("category_rename", id);
            return Ok(());
        }

        let mut next = self.next_state();
        if let Some(category) = next.categories.iter_mut().find(|category| category.id == id) {
            category.name = name.trim().to_string();
        }
        self.commit(next);

        info!("event=category_rename module=service status=ok category_id={id}");
        Ok(())
    }

    /// Removes a category, its tasks and its collapse entry.
    pub fn remove_category(&mut self, id: &str) -> ValidationResult<()> {
        if !self.state.has_category(id) {
            log_noop("category_remove", id);
            return Ok(());
        }

        let mut next = self.next_state();
        next.categories.retain(|category| category.id != id);
        let tasks_before = next.tasks.len();
        next.tasks.retain(|task| task.category_id != id);
        let removed_tasks = tasks_before - next.tasks.len();
        next.meta.collapsed_by_category_id.remove(id);
        self.commit(next);

        info!(
            "event=category_remove module=service status=ok category_id={id} removed_tasks={removed_tasks}"
        );
        Ok(())
    }

    /// Appends an open task to an existing category.
    ///
    /// # Errors
    /// - `InvalidLength` from title validation.
    /// - `UnknownCategory` when `category_id` does not exist.
    pub fn add_task(&mut self, category_id: &str, title: &str) -> ValidationResult<TaskId> {
        validate_task_title(title).inspect_err(|err| log_rejected("task_add", err))?;
        if !self.state.has_category(category_id) {
            let err = ValidationError::UnknownCategory(category_id.to_string());
            log_rejected("task_add", &err);
            return Err(err);
        }

        let mut next = self.next_state();
        let task = Task::new(category_id, title.trim(), self.clock.now_ms());
        let task_id = task.id.clone();
        next.tasks.push(task);
        self.commit(next);

        info!(
            "event=task_add module=service status=ok task_id={task_id} category_id={category_id}"
        );
        Ok(task_id)
    }

    /// Flips a task's completion flag.
    pub fn toggle_task(&mut self, id: &str) -> ValidationResult<()> {
        if self.state.find_task(id).is_none() {
            log_noop("task_toggle", id);
            return Ok(());
        }

        let now_ms = self.clock.now_ms();
        let mut next = self.next_state();
        if let Some(task) = next.tasks.iter_mut().find(|task| task.id == id) {
            task.toggle(now_ms);
            debug!(
                "event=task_toggle module=service status=ok task_id={id} done={}",
                task.done
            );
        }
        self.commit(next);
        Ok(())
    }

    /// Replaces a task title.
    ///
    /// # Errors
    /// - `InvalidLength` from title validation.
    pub fn rename_task(&mut self, id: &str, title: &str) -> ValidationResult<()> {
        validate_task_title(title).inspect_err(|err| log_rejected("task_rename", err))?;
        if self.state.find_task(id).is_none() {
            log_noop("task_rename", id);
            return Ok(());
        }

        let now_ms = self.clock.now_ms();
        let mut next = self.next_state();
        if let Some(task) = next.tasks.iter_mut().find(|task| task.id == id) {
            task.rename(title.trim(), now_ms);
        }
        self.commit(next);

        info!("event=task_rename module=service status=ok task_id={id}");
        Ok(())
    }

    /// Removes one task.
    pub fn remove_task(&mut self, id: &str) -> ValidationResult<()> {
        if self.state.find_task(id).is_none() {
            log_noop("task_remove", id);
            return Ok(());
        }

        let mut next = self.next_state();
        next.tasks.retain(|task| task.id != id);
        self.commit(next);

        info!("event=task_remove module=service status=ok task_id={id}");
        Ok(())
    }

    /// Removes every completed task of one category.
    ///
    /// Returns the number of removed tasks.
    pub fn clear_completed(&mut self, category_id: &str) -> ValidationResult<usize> {
        let removed = self.category_progress(category_id).done;
        if removed == 0 {
            log_noop("task_clear_completed", category_id);
            return Ok(0);
        }

        let mut next = self.next_state();
        next.tasks
            .retain(|task| !(task.category_id == category_id && task.done));
        self.commit(next);

        info!(
            "event=task_clear_completed module=service status=ok category_id={category_id} removed_tasks={removed}"
        );
        Ok(removed)
    }

    /// Sets or overwrites the collapse flag of an existing category.
    pub fn set_collapsed(&mut self, category_id: &str, collapsed: bool) {
        if !self.state.has_category(category_id) {
            log_noop("category_collapse", category_id);
            return;
        }

        let mut next = self.next_state();
        next.meta
            .collapsed_by_category_id
            .insert(category_id.to_string(), collapsed);
        self.commit(next);
        debug!(
            "event=category_collapse module=service status=ok category_id={category_id} collapsed={collapsed}"
        );
    }

    fn next_state(&self) -> AppState {
        AppState::clone(&self.state)
    }

    fn commit(&mut self, next: AppState) {
        self.state = Rc::new(next);
        self.persisted = self.gateway.save(&self.state);
        if !self.persisted {
            warn!("event=state_commit module=service status=degraded persisted=false");
        }
    }
}

fn log_rejected(command: &str, err: &ValidationError) {
    debug!(
        "event={command} module=service status=rejected reason={}",
        err.reason()
    );
}

fn log_noop(command: &str, id: &str) {
    debug!("event={command} module=service status=noop target_id={id}");
}

#[cfg(test)]
mod tests {
    use super::{BoardService, CategoryProgress};
    use crate::clock::ManualClock;
    use crate::repo::kv_repo::MemoryKvRepository;
    use crate::repo::state_gateway::PersistenceGateway;

    fn service() -> BoardService<MemoryKvRepository, ManualClock> {
        BoardService::with_clock(
            PersistenceGateway::new(MemoryKvRepository::new()),
            ManualClock::new(1_000, 10),
        )
    }

    #[test]
    fn add_category_stores_trimmed_name() {
        let mut board = service();
        let id = board.add_category("  Chores  ").unwrap();
        assert_eq!(board.category(&id).unwrap().name, "Chores");
    }

    #[test]
    fn progress_counts_done_and_total() {
        let mut board = service();
        let cat = board.add_category("Chores").unwrap();
        let first = board.add_task(&cat, "Sweep").unwrap();
        board.add_task(&cat, "Mop").unwrap();
        board.toggle_task(&first).unwrap();

        assert_eq!(
            board.category_progress(&cat),
            CategoryProgress { done: 1, total: 2 }
        );
    }

    #[test]
    fn snapshots_handed_out_are_not_mutated() {
        let mut board = service();
        let before = board.state();
        board.add_category("Chores").unwrap();
        assert!(before.categories.is_empty());
        assert_eq!(board.state().categories.len(), 1);
    }
}
