use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use taskboard_core::db::{open_db, open_db_in_memory};
use taskboard_core::{
    migrate, AppState, BoardService, Category, KvRepository, ManualClock, MemoryKvRepository,
    PersistenceGateway, SqliteKvRepository, StorageError, StorageResult, Subscriber,
    Subscription, Task, CURRENT_SCHEMA_VERSION, DEFAULT_STORAGE_KEY,
};

/// Store whose reads/writes can be switched to fail.
#[derive(Default)]
struct FlakyRepository {
    inner: MemoryKvRepository,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl KvRepository for FlakyRepository {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if self.fail_reads.get() {
            return Err(StorageError::Read("medium unavailable".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if self.fail_writes.get() {
            return Err(StorageError::Write("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }
}

fn sample_state() -> AppState {
    let mut state = AppState::empty();
    let chores = Category::new("Chores", 1_000, 0);
    let work = Category::new("Work", 1_001, 1);
    let mut done = Task::new(chores.id.clone(), "Wash dishes", 1_002);
    done.toggle(1_500);
    let open = Task::new(work.id.clone(), "Write report", 1_003);
    state
        .meta
        .collapsed_by_category_id
        .insert(work.id.clone(), true);
    state.categories = vec![chores, work];
    state.tasks = vec![done, open];
    state
}

#[test]
fn serialized_state_uses_documented_wire_shape() {
    let state = sample_state();
    let value = serde_json::to_value(&state).unwrap();

    assert_eq!(value["meta"]["version"], json!(CURRENT_SCHEMA_VERSION));
    assert_eq!(
        value["meta"]["collapsedByCategoryId"][&state.categories[1].id],
        json!(true)
    );
    let category = &value["categories"][0];
    for field in ["id", "name", "createdAt", "order"] {
        assert!(category.get(field).is_some(), "category missing {field}");
    }
    let task = &value["tasks"][0];
    for field in ["id", "categoryId", "title", "done", "createdAt", "updatedAt"] {
        assert!(task.get(field).is_some(), "task missing {field}");
    }
}

#[test]
fn migrate_of_serialized_state_is_structurally_equal() {
    for state in [AppState::empty(), sample_state()] {
        let text = serde_json::to_string(&state).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(migrate(Some(&raw)), state);
    }
}

#[test]
fn load_without_payload_returns_empty_state() {
    let gateway = PersistenceGateway::new(MemoryKvRepository::new());
    assert_eq!(gateway.load(), AppState::empty());
}

#[test]
fn read_failure_falls_back_to_empty_state() {
    let repo = FlakyRepository::default();
    repo.inner
        .set(DEFAULT_STORAGE_KEY, &serde_json::to_vec(&sample_state()).unwrap())
        .unwrap();
    repo.fail_reads.set(true);

    let gateway = PersistenceGateway::new(&repo);
    assert!(matches!(gateway.try_load(), Err(StorageError::Read(_))));
    assert_eq!(gateway.load(), AppState::empty());
}

#[test]
fn write_failure_skips_subscribers_and_keeps_previous_payload() {
    let repo = FlakyRepository::default();
    let gateway = PersistenceGateway::new(&repo);
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let _subscription = gateway.subscribe(Rc::new(move |_: &AppState| {
        counter.set(counter.get() + 1);
    }));

    assert!(gateway.save(&AppState::empty()));
    assert_eq!(calls.get(), 1);

    repo.fail_writes.set(true);
    assert!(!gateway.save(&sample_state()));
    assert!(matches!(
        gateway.try_save(&sample_state()),
        Err(StorageError::Write(_))
    ));
    assert_eq!(calls.get(), 1);

    repo.fail_writes.set(false);
    assert_eq!(gateway.load(), AppState::empty());
}

#[test]
fn board_keeps_in_memory_state_when_writes_fail() {
    let repo = FlakyRepository::default();
    repo.fail_writes.set(true);
    let mut board =
        BoardService::with_clock(PersistenceGateway::new(&repo), ManualClock::new(1, 1));

    assert!(board.is_persisted());
    let id = board.add_category("Chores").unwrap();
    assert_eq!(board.categories()[0].id, id);
    assert!(!board.is_persisted());

    repo.fail_writes.set(false);
    assert_eq!(board.gateway().load(), AppState::empty());

    board.add_category("Work").unwrap();
    assert!(board.is_persisted());
    assert_eq!(board.gateway().load().categories.len(), 2);
}

#[test]
fn subscribers_run_in_subscription_order() {
    let gateway = PersistenceGateway::new(MemoryKvRepository::new());
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut subscriptions = Vec::new();
    for label in ["render", "badge", "title"] {
        let sink = Rc::clone(&order);
        subscriptions.push(gateway.subscribe(Rc::new(move |_: &AppState| {
            sink.borrow_mut().push(label);
        })));
    }

    gateway.save(&AppState::empty());
    assert_eq!(*order.borrow(), vec!["render", "badge", "title"]);
    assert_eq!(subscriptions.len(), 3);
}

#[test]
fn subscriber_may_unsubscribe_itself_during_notification() {
    let gateway = PersistenceGateway::new(MemoryKvRepository::new());
    let handle: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    let calls = Rc::new(Cell::new(0));

    let slot = Rc::clone(&handle);
    let counter = Rc::clone(&calls);
    let once: Subscriber = Rc::new(move |_: &AppState| {
        counter.set(counter.get() + 1);
        if let Some(subscription) = slot.borrow_mut().take() {
            subscription.unsubscribe();
        }
    });
    *handle.borrow_mut() = Some(gateway.subscribe(once));

    gateway.save(&AppState::empty());
    gateway.save(&AppState::empty());
    assert_eq!(calls.get(), 1);
    assert_eq!(gateway.subscriber_count(), 0);
}

#[test]
fn sqlite_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");
    let state = sample_state();

    {
        let conn = open_db(&path).unwrap();
        let gateway = PersistenceGateway::new(SqliteKvRepository::try_new(&conn).unwrap());
        assert!(gateway.save(&AppState::empty()));
        assert!(gateway.save(&state));
    }

    let conn = open_db(&path).unwrap();
    let gateway = PersistenceGateway::new(SqliteKvRepository::try_new(&conn).unwrap());
    assert_eq!(gateway.load(), state);
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM kv_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn sqlite_corrupt_payload_loads_as_empty_state() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteKvRepository::try_new(&conn).unwrap();
    repo.set(DEFAULT_STORAGE_KEY, b"\xff\xfe not json").unwrap();

    let gateway = PersistenceGateway::new(repo);
    assert!(matches!(gateway.try_load(), Err(StorageError::Corrupt(_))));
    assert_eq!(gateway.load(), AppState::empty());
}

#[test]
fn storage_keys_are_isolated() {
    let store = MemoryKvRepository::new();
    let first = PersistenceGateway::with_key(store.clone(), "board.a");
    let second = PersistenceGateway::with_key(store.clone(), "board.b");

    first.save(&sample_state());
    assert_eq!(second.load(), AppState::empty());
    assert_eq!(store.len(), 1);
    assert_eq!(first.storage_key(), "board.a");
}
