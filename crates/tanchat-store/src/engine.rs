//! The in-memory database engine and its durable mirror.
//!
//! One `Engine` owns one in-memory SQLite connection for the lifetime of the
//! app. Every committed mutation is followed by a full snapshot written to the
//! durable slot. Construct it once at the composition root and share it (for
//! example behind an `Arc`) with the repository layer.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::schema;
use crate::slot::DurableSlot;
use crate::snapshot;

/// Slot key used by the browser build of the app.
pub const DEFAULT_SNAPSHOT_KEY: &str = "chatdb";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Durable slot key holding the base64 snapshot
    pub snapshot_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

/// Observable lifecycle of the engine.
///
/// `Uninitialized -> Initializing -> Ready | Failed`; `reset()` returns to
/// `Uninitialized` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStatus::Uninitialized => "uninitialized",
            EngineStatus::Initializing => "initializing",
            EngineStatus::Ready => "ready",
            EngineStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A ready connection and the image last written to the slot.
struct Live {
    conn: Connection,
    durable: Vec<u8>,
}

enum EngineState {
    Uninitialized,
    Initializing,
    Ready(Live),
    Failed(String),
}

impl EngineState {
    fn status(&self) -> EngineStatus {
        match self {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Initializing => EngineStatus::Initializing,
            EngineState::Ready(_) => EngineStatus::Ready,
            EngineState::Failed(_) => EngineStatus::Failed,
        }
    }
}

/// In-memory SQLite engine mirrored to a durable slot.
pub struct Engine {
    slot: Arc<dyn DurableSlot>,
    config: StoreConfig,
    state: Mutex<EngineState>,
    // Held for the whole of initialize()/reset() so only one caller loads.
    init_gate: Mutex<()>,
}

impl Engine {
    pub fn new(slot: Arc<dyn DurableSlot>, config: StoreConfig) -> Self {
        Self {
            slot,
            config,
            state: Mutex::new(EngineState::Uninitialized),
            init_gate: Mutex::new(()),
        }
    }

    /// Create and initialize an engine in one step.
    pub fn open(slot: Arc<dyn DurableSlot>, config: StoreConfig) -> Result<Self> {
        let engine = Self::new(slot, config);
        engine.initialize()?;
        Ok(engine)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn status(&self) -> EngineStatus {
        self.state
            .lock()
            .map(|state| state.status())
            .unwrap_or(EngineStatus::Failed)
    }

    /// Why the engine is `Failed`, if it is.
    pub fn failure(&self) -> Option<String> {
        match &*self.state.lock().ok()? {
            EngineState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Bring the engine to `Ready`.
    ///
    /// Loads the snapshot from the slot when one exists, otherwise starts an
    /// empty database; either way the schema is ensured and the result written
    /// back. Calling this on a `Ready` engine is a no-op. On a `Failed` engine
    /// the recorded failure is returned again.
    pub fn initialize(&self) -> Result<()> {
        let _gate = self
            .init_gate
            .lock()
            .map_err(|e| StoreError::Initialization(format!("init gate: {}", e)))?;

        {
            let mut state = self.lock_state()?;
            match &*state {
                EngineState::Ready(_) => return Ok(()),
                EngineState::Failed(reason) => {
                    return Err(StoreError::Initialization(reason.clone()))
                }
                EngineState::Uninitialized | EngineState::Initializing => {}
            }
            *state = EngineState::Initializing;
        }

        let loaded = self.load();

        let mut state = self.lock_state()?;
        match loaded {
            Ok(live) => {
                *state = EngineState::Ready(live);
                Ok(())
            }
            Err(err) => {
                let reason = match &err {
                    StoreError::Initialization(reason) => reason.clone(),
                    other => other.to_string(),
                };
                tracing::error!("Database initialization failed: {}", reason);
                *state = EngineState::Failed(reason.clone());
                Err(StoreError::Initialization(reason))
            }
        }
    }

    fn load(&self) -> Result<Live> {
        let key = &self.config.snapshot_key;
        let saved = self
            .slot
            .read(key)
            .map_err(|e| StoreError::Initialization(format!("read slot {}: {}", key, e)))?;

        let conn = match saved {
            Some(text) if !text.trim().is_empty() => {
                let image = snapshot::decode(&text)?;
                let conn = snapshot::import(&image)?;
                tracing::info!("Loaded database snapshot from {:?} ({} bytes)", key, image.len());
                conn
            }
            _ => {
                tracing::info!("No snapshot under {:?}, starting an empty database", key);
                Connection::open_in_memory()
                    .map_err(|e| StoreError::Initialization(format!("open_in_memory: {}", e)))?
            }
        };

        schema::ensure_schema(&conn)?;

        // New databases and patched legacy snapshots are written back right away.
        let durable = self
            .write_snapshot(&conn)
            .map_err(|e| StoreError::Initialization(format!("initial persist: {}", e)))?;
        Ok(Live { conn, durable })
    }

    /// Write a full snapshot of the current database to the slot.
    pub fn persist(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        match &mut *state {
            EngineState::Ready(live) => {
                live.durable = self.write_snapshot(&live.conn)?;
                Ok(())
            }
            other => Err(StoreError::NotInitialized(other.status())),
        }
    }

    /// Drop the durable snapshot and return to `Uninitialized`.
    ///
    /// Destructive: everything stored is gone. The caller is expected to
    /// reload, i.e. call `initialize()` again to start from an empty database.
    pub fn reset(&self) -> Result<()> {
        let _gate = self
            .init_gate
            .lock()
            .map_err(|e| StoreError::Storage(format!("init gate: {}", e)))?;
        self.slot.remove(&self.config.snapshot_key)?;
        let mut state = self.lock_state()?;
        *state = EngineState::Uninitialized;
        tracing::info!("Database reset, snapshot {:?} removed", self.config.snapshot_key);
        Ok(())
    }

    /// The encoded snapshot of the current database, as it would be persisted.
    pub fn snapshot_text(&self) -> Result<String> {
        self.read(|conn| Ok(snapshot::encode(&snapshot::export(conn)?)))
    }

    /// Run a read-only closure against the ready connection.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let state = self.lock_state()?;
        match &*state {
            EngineState::Ready(live) => f(&live.conn),
            other => Err(StoreError::NotInitialized(other.status())),
        }
    }

    /// Run a mutating closure in one transaction, then persist.
    ///
    /// When the closure fails the transaction is rolled back and nothing is
    /// written. When the snapshot write fails after commit, the connection is
    /// restored from the last durable image, so a mutation reported as failed
    /// never reaches the slot later. If even that restore fails the engine
    /// moves to `Failed`.
    pub(crate) fn mutate<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut state = self.lock_state()?;
        let live = match &mut *state {
            EngineState::Ready(live) => live,
            other => return Err(StoreError::NotInitialized(other.status())),
        };

        let tx = live
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        let out = f(&tx)?;
        tx.commit().map_err(|e| StoreError::sql("commit", e))?;

        match self.write_snapshot(&live.conn) {
            Ok(image) => {
                live.durable = image;
                Ok(out)
            }
            Err(err) => {
                tracing::error!("Persist failed, reverting to last durable snapshot: {}", err);
                match restore(&live.durable) {
                    Ok(conn) => live.conn = conn,
                    Err(reason) => {
                        tracing::error!("Revert failed: {}", reason);
                        *state = EngineState::Failed(format!("revert after failed persist: {}", reason));
                    }
                }
                Err(err)
            }
        }
    }

    /// Write a full snapshot and return the image that is now durable.
    fn write_snapshot(&self, conn: &Connection) -> Result<Vec<u8>> {
        let image = snapshot::export(conn)?;
        self.slot
            .write(&self.config.snapshot_key, &snapshot::encode(&image))?;
        tracing::debug!("Persisted snapshot ({} bytes)", image.len());
        Ok(image)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, EngineState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Storage(format!("engine lock: {}", e)))
    }
}

/// A fresh connection from a durable image, with connection settings reapplied.
fn restore(image: &[u8]) -> Result<Connection> {
    let conn = snapshot::import(image)?;
    schema::ensure_schema(&conn)?;
    Ok(conn)
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{MemorySlot, SlotError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn memory_engine() -> (MemorySlot, Engine) {
        let slot = MemorySlot::new();
        let engine = Engine::new(Arc::new(slot.clone()), StoreConfig::default());
        (slot, engine)
    }

    /// Counts reads so tests can see how many times a snapshot was loaded.
    struct CountingSlot {
        inner: MemorySlot,
        reads: AtomicUsize,
    }

    impl DurableSlot for CountingSlot {
        fn read(&self, key: &str) -> std::result::Result<Option<String>, SlotError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(key)
        }
        fn write(&self, key: &str, value: &str) -> std::result::Result<(), SlotError> {
            self.inner.write(key, value)
        }
        fn remove(&self, key: &str) -> std::result::Result<(), SlotError> {
            self.inner.remove(key)
        }
    }

    /// Writes fail while `failing` is set.
    struct FlakySlot {
        inner: MemorySlot,
        failing: AtomicBool,
    }

    impl DurableSlot for FlakySlot {
        fn read(&self, key: &str) -> std::result::Result<Option<String>, SlotError> {
            self.inner.read(key)
        }
        fn write(&self, key: &str, value: &str) -> std::result::Result<(), SlotError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SlotError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "quota exceeded",
                )));
            }
            self.inner.write(key, value)
        }
        fn remove(&self, key: &str) -> std::result::Result<(), SlotError> {
            self.inner.remove(key)
        }
    }

    fn insert_conversation(engine: &Engine, id: &str) -> Result<()> {
        engine.mutate(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, title) VALUES (?1, 't')",
                [id],
            )
            .map_err(|e| StoreError::sql("insert", e))?;
            Ok(())
        })
    }

    fn conversation_ids(engine: &Engine) -> Vec<String> {
        engine
            .read(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id FROM conversations ORDER BY rowid")
                    .map_err(|e| StoreError::sql("prepare", e))?;
                let ids = stmt
                    .query_map([], |row| row.get(0))
                    .map_err(|e| StoreError::sql("query", e))?
                    .collect::<std::result::Result<Vec<String>, _>>()
                    .map_err(|e| StoreError::sql("collect", e))?;
                Ok(ids)
            })
            .unwrap()
    }

    #[test]
    fn failed_persist_reverts_the_committed_mutation() {
        let slot = Arc::new(FlakySlot {
            inner: MemorySlot::new(),
            failing: AtomicBool::new(false),
        });
        let engine = Engine::open(slot.clone(), StoreConfig::default()).unwrap();

        slot.failing.store(true, Ordering::SeqCst);
        let err = insert_conversation(&engine, "ghost").unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)), "{err}");
        assert_eq!(engine.status(), EngineStatus::Ready);
        assert!(conversation_ids(&engine).is_empty());

        slot.failing.store(false, Ordering::SeqCst);
        insert_conversation(&engine, "real").unwrap();
        assert_eq!(conversation_ids(&engine), vec!["real"]);

        let reopened = Engine::open(Arc::new(slot.inner.clone()), StoreConfig::default()).unwrap();
        assert_eq!(conversation_ids(&reopened), vec!["real"]);
    }

    #[test]
    fn reverted_connection_still_enforces_foreign_keys() {
        let slot = Arc::new(FlakySlot {
            inner: MemorySlot::new(),
            failing: AtomicBool::new(false),
        });
        let engine = Engine::open(slot.clone(), StoreConfig::default()).unwrap();
        slot.failing.store(true, Ordering::SeqCst);
        assert!(insert_conversation(&engine, "ghost").is_err());
        slot.failing.store(false, Ordering::SeqCst);

        let err = engine
            .mutate(|conn| {
                conn.execute(
                    "INSERT INTO messages (id, conversation_id, role, content) VALUES ('m', 'nope', 'user', 'x')",
                    [],
                )
                .map_err(|e| StoreError::sql("insert", e))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[test]
    fn fresh_engine_persists_immediately() {
        let (slot, engine) = memory_engine();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);

        engine.initialize().unwrap();

        assert_eq!(engine.status(), EngineStatus::Ready);
        assert!(slot.read(DEFAULT_SNAPSHOT_KEY).unwrap().is_some());
    }

    #[test]
    fn operations_before_ready_fail_fast() {
        let (_slot, engine) = memory_engine();
        let err = engine.persist().unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotInitialized(EngineStatus::Uninitialized)
        ));
        assert!(matches!(
            engine.read(|_| Ok(())),
            Err(StoreError::NotInitialized(_))
        ));
    }

    #[test]
    fn concurrent_initialize_loads_once() {
        let slot = Arc::new(CountingSlot {
            inner: MemorySlot::new(),
            reads: AtomicUsize::new(0),
        });
        let engine = Arc::new(Engine::new(slot.clone(), StoreConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || engine.initialize())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(engine.status(), EngineStatus::Ready);
        assert_eq!(slot.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corrupt_snapshot_fails_until_reset() {
        let (slot, engine) = memory_engine();
        slot.write(DEFAULT_SNAPSHOT_KEY, "not//base64??").unwrap();

        assert!(matches!(
            engine.initialize(),
            Err(StoreError::Initialization(_))
        ));
        assert_eq!(engine.status(), EngineStatus::Failed);
        assert!(engine.failure().unwrap().contains("base64"));
        // Still failed on retry; no silent recovery.
        assert!(matches!(
            engine.initialize(),
            Err(StoreError::Initialization(_))
        ));

        engine.reset().unwrap();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert!(engine.failure().is_none());
        engine.initialize().unwrap();
        assert_eq!(engine.status(), EngineStatus::Ready);
    }

    #[test]
    fn failed_mutation_rolls_back_and_skips_persist() {
        let (slot, engine) = memory_engine();
        engine.initialize().unwrap();
        let before = slot.read(DEFAULT_SNAPSHOT_KEY).unwrap();

        let result: Result<()> = engine.mutate(|conn| {
            conn.execute("INSERT INTO conversations (id, title) VALUES ('c', 't')", [])
                .map_err(|e| StoreError::sql("insert", e))?;
            Err(StoreError::Validation("abort".into()))
        });
        assert!(result.is_err());

        let rows: i64 = engine
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
                    .map_err(|e| StoreError::sql("count", e))
            })
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(slot.read(DEFAULT_SNAPSHOT_KEY).unwrap(), before);
    }

    #[test]
    fn snapshot_text_restores_current_rows() {
        let (_slot, engine) = memory_engine();
        engine.initialize().unwrap();
        engine
            .mutate(|conn| {
                conn.execute("INSERT INTO conversations (id, title) VALUES ('c', 't')", [])
                    .map_err(|e| StoreError::sql("insert", e))
            })
            .unwrap();

        let text = engine.snapshot_text().unwrap();
        let restored = snapshot::import(&snapshot::decode(&text).unwrap()).unwrap();
        let title: String = restored
            .query_row("SELECT title FROM conversations WHERE id = 'c'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "t");
    }

    #[test]
    fn custom_snapshot_key_is_used() {
        let slot = MemorySlot::new();
        let config = StoreConfig {
            snapshot_key: "chatdb-test".into(),
        };
        let engine = Engine::open(Arc::new(slot.clone()), config).unwrap();
        assert!(slot.read("chatdb-test").unwrap().is_some());
        assert!(slot.read(DEFAULT_SNAPSHOT_KEY).unwrap().is_none());

        engine.reset().unwrap();
        assert!(slot.read("chatdb-test").unwrap().is_none());
    }
}
