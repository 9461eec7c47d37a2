//! Persistence gateway for whole-state snapshots.
//!
//! # Responsibility
//! - Load the persisted blob and normalize it to the current schema.
//! - Save snapshots and broadcast them to subscribers after a successful write.
//!
//! # Invariants
//! - `load` never fails: unreadable or corrupt payloads fall back to an empty
//!   migrated state and are logged.
//! - Subscribers run synchronously, in subscription order, at most once per
//!   save, and only when the write succeeded.
//! - Migration only rebuilds `meta`; decodable categories/tasks are kept.

use crate::model::category::Category;
use crate::model::state::{AppState, Meta, CURRENT_SCHEMA_VERSION};
use crate::model::task::Task;
use crate::repo::kv_repo::{KvRepository, StorageError, StorageResult};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Storage key used when no override is configured.
pub const DEFAULT_STORAGE_KEY: &str = "taskboard.state.v1";

/// Change callback receiving the snapshot that was just persisted.
pub type Subscriber = Rc<dyn Fn(&AppState)>;

type SubscriberList = RefCell<Vec<Subscriber>>;

/// Handle returned by `subscribe`; call `unsubscribe` to deregister.
///
/// Dropping the handle keeps the subscription active.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    subscribers: Weak<SubscriberList>,
    subscriber: Subscriber,
}

impl Subscription {
    /// Removes the callback. No-op when the gateway is already gone.
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .borrow_mut()
                .retain(|existing| !Rc::ptr_eq(existing, &self.subscriber));
        }
    }
}

/// Serializes `AppState` into one key of a `KvRepository`.
pub struct PersistenceGateway<R: KvRepository> {
    repo: R,
    key: String,
    subscribers: Rc<SubscriberList>,
}

impl<R: KvRepository> PersistenceGateway<R> {
    /// Creates a gateway writing under `DEFAULT_STORAGE_KEY`.
    pub fn new(repo: R) -> Self {
        Self::with_key(repo, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(repo: R, key: impl Into<String>) -> Self {
        Self {
            repo,
            key: key.into(),
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn storage_key(&self) -> &str {
        self.key.as_str()
    }

    /// Loads and migrates the persisted state, falling back to empty.
    pub fn load(&self) -> AppState {
        match self.try_load() {
            Ok(state) => {
                info!(
                    "event=state_load module=repo status=ok categories={} tasks={}",
                    state.categories.len(),
                    state.tasks.len()
                );
                state
            }
            Err(err) => {
                error!(
                    "event=state_load module=repo status=error error_code={} error={}",
                    storage_error_code(&err),
                    err
                );
                migrate(None)
            }
        }
    }

    /// Loads and migrates the persisted state, reporting storage faults.
    ///
    /// # Errors
    /// - `StorageError::Read` when the medium cannot be read.
    /// - `StorageError::Corrupt` when the payload is not valid JSON.
    pub fn try_load(&self) -> StorageResult<AppState> {
        let Some(bytes) = self.repo.get(self.key.as_str())? else {
            return Ok(migrate(None));
        };
        let raw: Value = serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::Corrupt(err.to_string()))?;
        Ok(migrate(Some(&raw)))
    }

    /// Persists the snapshot and notifies subscribers.
    ///
    /// Returns whether the write succeeded. Failures are logged and
    /// subscribers are not invoked.
    pub fn save(&self, state: &AppState) -> bool {
        match self.try_save(state) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    "event=state_save module=repo status=error error_code={} error={}",
                    storage_error_code(&err),
                    err
                );
                false
            }
        }
    }

    /// Persists the snapshot and notifies subscribers.
    ///
    /// # Errors
    /// - `StorageError::Write` when serialization or the durable write fails.
    pub fn try_save(&self, state: &AppState) -> StorageResult<()> {
        let payload =
            serde_json::to_vec(state).map_err(|err| StorageError::Write(err.to_string()))?;
        self.repo.set(self.key.as_str(), &payload)?;
        debug!(
            "event=state_save module=repo status=ok bytes={} categories={} tasks={}",
            payload.len(),
            state.categories.len(),
            state.tasks.len()
        );
        self.notify(state);
        Ok(())
    }

    /// Registers a callback for future saves.
    ///
    /// Registering the same `Rc` twice keeps a single registration.
    pub fn subscribe(&self, subscriber: Subscriber) -> Subscription {
        {
            let mut subscribers = self.subscribers.borrow_mut();
            if !subscribers
                .iter()
                .any(|existing| Rc::ptr_eq(existing, &subscriber))
            {
                subscribers.push(Rc::clone(&subscriber));
            }
        }
        Subscription {
            subscribers: Rc::downgrade(&self.subscribers),
            subscriber,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    fn notify(&self, state: &AppState) {
        // Snapshot so callbacks may (un)subscribe while being notified.
        let subscribers: Vec<Subscriber> = self.subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(state);
        }
    }
}

/// Normalizes an arbitrary or absent persisted value to the current schema.
///
/// - Absent or non-object input yields a fresh empty state.
/// - `meta` is rebuilt at `CURRENT_SCHEMA_VERSION` when missing or on a
///   different version, keeping any boolean collapse entries.
/// - Category and task records are kept as stored. Fields added after the
///   first schema are filled in (`order` from the array index, `createdAt`
///   as `0`, `done` as `false`, `updatedAt` from `createdAt`).
/// - Records still missing an id/name/title/category are skipped with a
///   warning, as are tasks whose category is not present.
pub fn migrate(raw: Option<&Value>) -> AppState {
    let Some(Value::Object(root)) = raw else {
        return AppState::empty();
    };

    let categories: Vec<Category> =
        decode_records(root.get("categories"), "category", fill_category_defaults);
    let mut tasks: Vec<Task> = decode_records(root.get("tasks"), "task", fill_task_defaults);
    tasks.retain(|task| {
        let resolved = categories
            .iter()
            .any(|category| category.id == task.category_id);
        if !resolved {
            warn!(
                "event=state_migrate module=repo status=skipped kind=task task_id={} reason=unknown_category category_id={}",
                task.id, task.category_id
            );
        }
        resolved
    });

    AppState {
        meta: migrate_meta(root.get("meta")),
        categories,
        tasks,
    }
}

fn migrate_meta(raw: Option<&Value>) -> Meta {
    if let Some(value) = raw {
        if let Ok(meta) = Meta::deserialize(value) {
            if meta.version == CURRENT_SCHEMA_VERSION {
                return meta;
            }
        }
    }

    let collapsed_by_category_id = collapsed_entries(raw);
    info!(
        "event=state_migrate module=repo status=ok from_version={} to_version={} collapsed_entries={}",
        raw.and_then(|meta| meta.get("version"))
            .map_or_else(|| "none".to_string(), Value::to_string),
        CURRENT_SCHEMA_VERSION,
        collapsed_by_category_id.len()
    );
    Meta {
        version: CURRENT_SCHEMA_VERSION,
        collapsed_by_category_id,
    }
}

fn collapsed_entries(meta: Option<&Value>) -> BTreeMap<String, bool> {
    meta.and_then(|meta| meta.get("collapsedByCategoryId"))
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(id, flag)| flag.as_bool().map(|flag| (id.clone(), flag)))
                .collect()
        })
        .unwrap_or_default()
}

fn fill_category_defaults(index: usize, record: &mut Map<String, Value>) {
    record
        .entry("order")
        .or_insert_with(|| Value::from(index as i64));
    record.entry("createdAt").or_insert_with(|| Value::from(0_i64));
}

fn fill_task_defaults(_index: usize, record: &mut Map<String, Value>) {
    record.entry("done").or_insert(Value::Bool(false));
    let created_at = record
        .entry("createdAt")
        .or_insert_with(|| Value::from(0_i64))
        .clone();
    record.entry("updatedAt").or_insert(created_at);
}

fn decode_records<T: DeserializeOwned>(
    raw: Option<&Value>,
    kind: &str,
    fill_defaults: fn(usize, &mut Map<String, Value>),
) -> Vec<T> {
    let items = match raw {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => return Vec::new(),
        Some(_) => {
            warn!("event=state_migrate module=repo status=skipped kind={kind} reason=not_an_array");
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let mut item = item.clone();
            if let Value::Object(record) = &mut item {
                fill_defaults(index, record);
            }
            decode_record(index, &item, kind)
        })
        .collect()
}

fn decode_record<T: DeserializeOwned>(index: usize, item: &Value, kind: &str) -> Option<T> {
    match T::deserialize(item) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(
                "event=state_migrate module=repo status=skipped kind={kind} index={index} error={err}"
            );
            None
        }
    }
}

fn storage_error_code(err: &StorageError) -> &'static str {
    match err {
        StorageError::Read(_) => "storage_read_failed",
        StorageError::Write(_) => "storage_write_failed",
        StorageError::Corrupt(_) => "storage_payload_corrupt",
        StorageError::Db(_) => "storage_db_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::{migrate, PersistenceGateway, Subscriber};
    use crate::model::category::Category;
    use crate::model::state::{AppState, CURRENT_SCHEMA_VERSION};
    use crate::repo::kv_repo::{KvRepository, MemoryKvRepository};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn migrate_absent_returns_empty_current_state() {
        assert_eq!(migrate(None), AppState::empty());
        assert_eq!(migrate(Some(&json!(42))), AppState::empty());
    }

    #[test]
    fn migrate_rebuilds_outdated_meta_and_keeps_collapse_entries() {
        let raw = json!({
            "meta": { "version": 0, "collapsedByCategoryId": { "cat_a": true, "cat_b": "yes" } },
            "categories": [ { "id": "cat_a", "name": "Chores", "createdAt": 1, "order": 0 } ],
            "tasks": []
        });
        let state = migrate(Some(&raw));
        assert_eq!(state.meta.version, CURRENT_SCHEMA_VERSION);
        assert_eq!(state.meta.collapsed_by_category_id.get("cat_a"), Some(&true));
        assert!(!state.meta.collapsed_by_category_id.contains_key("cat_b"));
        assert_eq!(state.categories.len(), 1);
    }

    #[test]
    fn migrate_without_meta_keeps_records() {
        let raw = json!({
            "categories": [ { "id": "cat_a", "name": "Chores", "createdAt": 1, "order": 0 } ],
            "tasks": [ {
                "id": "task_a", "categoryId": "cat_a", "title": "Sweep",
                "done": true, "createdAt": 2, "updatedAt": 3
            } ]
        });
        let state = migrate(Some(&raw));
        assert_eq!(state.meta.version, CURRENT_SCHEMA_VERSION);
        assert!(state.meta.collapsed_by_category_id.is_empty());
        assert_eq!(state.tasks[0].title, "Sweep");
        assert!(state.tasks[0].done);
    }

    #[test]
    fn migrate_skips_only_undecodable_records() {
        let raw = json!({
            "meta": { "version": 1, "collapsedByCategoryId": {} },
            "categories": [
                { "id": "cat_a", "name": "Chores", "createdAt": 1, "order": 0 },
                { "id": "cat_b" }
            ],
            "tasks": "nope"
        });
        let state = migrate(Some(&raw));
        assert_eq!(state.categories.len(), 1);
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn migrate_fills_fields_missing_from_older_records() {
        let raw = json!({
            "meta": { "version": 0 },
            "categories": [
                { "id": "cat_z", "name": "Errands", "createdAt": 5, "order": 4 },
                { "id": "cat_a", "name": "Chores", "createdAt": 1 }
            ],
            "tasks": [ { "id": "task_a", "categoryId": "cat_a", "title": "Sweep", "createdAt": 7 } ]
        });
        let state = migrate(Some(&raw));

        assert_eq!(state.categories.len(), 2);
        let chores = state.find_category("cat_a").unwrap();
        assert_eq!(chores.order, 1);
        assert_eq!(chores.created_at, 1);

        assert_eq!(state.tasks.len(), 1);
        let task = &state.tasks[0];
        assert_eq!(task.category_id, "cat_a");
        assert!(!task.done);
        assert_eq!(task.updated_at, 7);
    }

    #[test]
    fn migrate_drops_tasks_whose_category_is_missing() {
        let raw = json!({
            "meta": { "version": 1, "collapsedByCategoryId": {} },
            "categories": [ { "id": "cat_a", "name": "Chores", "createdAt": 1, "order": 0 } ],
            "tasks": [
                { "id": "task_a", "categoryId": "cat_a", "title": "Sweep",
                  "done": false, "createdAt": 2, "updatedAt": 2 },
                { "id": "task_b", "categoryId": "cat_gone", "title": "Orphan",
                  "done": false, "createdAt": 3, "updatedAt": 3 }
            ]
        });
        let state = migrate(Some(&raw));

        let ids: Vec<&str> = state.tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["task_a"]);
        assert!(state
            .tasks
            .iter()
            .all(|task| state.has_category(&task.category_id)));
    }

    #[test]
    fn corrupt_payload_loads_as_empty_state() {
        let store = MemoryKvRepository::new();
        store.set("taskboard.state.v1", b"{not json").unwrap();

        let gateway = PersistenceGateway::new(store);
        assert!(gateway.try_load().is_err());
        assert_eq!(gateway.load(), AppState::empty());
    }

    #[test]
    fn duplicate_subscription_is_notified_once() {
        let gateway = PersistenceGateway::new(MemoryKvRepository::new());
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let subscriber: Subscriber = Rc::new(move |_: &AppState| *counter.borrow_mut() += 1);

        let first = gateway.subscribe(Rc::clone(&subscriber));
        let _second = gateway.subscribe(subscriber);
        assert_eq!(gateway.subscriber_count(), 1);

        assert!(gateway.save(&AppState::empty()));
        assert_eq!(*calls.borrow(), 1);

        first.unsubscribe();
        assert_eq!(gateway.subscriber_count(), 0);
        assert!(gateway.save(&AppState::empty()));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn saved_state_round_trips_through_load() {
        let gateway = PersistenceGateway::with_key(MemoryKvRepository::new(), "custom");
        let mut state = AppState::empty();
        let category = Category::new("Chores", 10, 0);
        state
            .meta
            .collapsed_by_category_id
            .insert(category.id.clone(), true);
        state.categories.push(category);

        assert!(gateway.save(&state));
        assert_eq!(gateway.load(), state);
    }
}
