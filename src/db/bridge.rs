//! Persistence bridge for platforms without a native on-disk engine.
//!
//! The live database is an in-memory SQLite image. A [`SnapshotStore`] holds
//! the durable copy: the image is loaded from it when a connection opens and
//! written back to it after every write.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rusqlite::backup::{Backup, Progress};
use rusqlite::{Connection, DatabaseName};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::flight::Flight;
use crate::error::Error;

/// Pages copied per backup step between in-memory images.
const COPY_PAGES_PER_STEP: i32 = 128;

/// Durable backing store for an in-memory database image.
///
/// `init` may block on I/O and runs on the blocking pool. `load` and `flush`
/// run inline on the async worker while the connection lock is held, since
/// they need the live `Connection`, which cannot leave that lock.
pub trait SnapshotStore: Send + Sync + fmt::Debug {
    /// Prepare the store for use. Runs before the first load and again after
    /// a recovery cycle.
    fn init(&self) -> Result<(), Error>;

    /// Copy the stored image into `conn`. Returns `false` when nothing has
    /// been stored yet.
    fn load(&self, conn: &mut Connection) -> Result<bool, Error>;

    /// Persist the current image of `conn`.
    fn flush(&self, conn: &Connection) -> Result<(), Error>;
}

/// Snapshot store backed by a single database file on disk.
///
/// Flushes go through the online-backup API into a sibling temp file that is
/// then renamed over the snapshot, so a crash mid-flush leaves the previous
/// image intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".flush");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn init(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::StoreInit(format!("{}: {}", parent.display(), e)))?;
        }
        Ok(())
    }

    fn load(&self, conn: &mut Connection) -> Result<bool, Error> {
        if !self.path.exists() {
            return Ok(false);
        }
        conn.restore(DatabaseName::Main, &self.path, None::<fn(Progress)>)
            .map_err(|e| Error::StoreInit(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "Loaded snapshot");
        Ok(true)
    }

    fn flush(&self, conn: &Connection) -> Result<(), Error> {
        let temp = self.temp_path();
        if temp.exists() {
            fs::remove_file(&temp).map_err(|e| Error::Flush(e.to_string()))?;
        }
        conn.backup(DatabaseName::Main, &temp, None)
            .map_err(|e| Error::Flush(e.to_string()))?;
        fs::rename(&temp, &self.path).map_err(|e| Error::Flush(e.to_string()))?;
        debug!(path = %self.path.display(), "Flushed snapshot");
        Ok(())
    }
}

/// Snapshot store that keeps the durable image in a second in-memory
/// connection. Survives reconnects within one process.
#[derive(Default)]
pub struct MemorySnapshotStore {
    image: StdMutex<Option<Connection>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MemorySnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySnapshotStore").finish_non_exhaustive()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn init(&self) -> Result<(), Error> {
        Ok(())
    }

    fn load(&self, conn: &mut Connection) -> Result<bool, Error> {
        let image = self
            .image
            .lock()
            .map_err(|_| Error::StoreInit("snapshot lock poisoned".to_string()))?;
        match image.as_ref() {
            Some(src) => {
                copy_image(src, conn).map_err(|e| Error::StoreInit(e.to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn flush(&self, conn: &Connection) -> Result<(), Error> {
        let mut image = self
            .image
            .lock()
            .map_err(|_| Error::Flush("snapshot lock poisoned".to_string()))?;
        if image.is_none() {
            *image = Some(Connection::open_in_memory().map_err(|e| Error::Flush(e.to_string()))?);
        }
        if let Some(dst) = image.as_mut() {
            copy_image(conn, dst).map_err(|e| Error::Flush(e.to_string()))?;
        }
        Ok(())
    }
}

fn copy_image(src: &Connection, dst: &mut Connection) -> rusqlite::Result<()> {
    let backup = Backup::new(src, dst)?;
    backup.run_to_completion(COPY_PAGES_PER_STEP, Duration::ZERO, None)
}

/// Guards one-time initialization of a [`SnapshotStore`] and routes
/// load/flush calls to it.
pub struct PersistenceBridge {
    store: Arc<dyn SnapshotStore>,
    ready: Mutex<bool>,
    flight: Flight,
    inits: AtomicUsize,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            ready: Mutex::new(false),
            flight: Flight::default(),
            inits: AtomicUsize::new(0),
        }
    }

    /// Initialize the backing store if it is not ready yet.
    ///
    /// Callers arriving while an initialization is in flight wait on the same
    /// lock and observe its outcome, success or failure, instead of starting
    /// another one.
    pub async fn ensure_ready(&self) -> Result<(), Error> {
        let ticket = self.flight.arrive();
        let mut ready = self.ready.lock().await;
        if *ready {
            return Ok(());
        }
        if let Some(err) = self.flight.failure_since(ticket) {
            return Err(err);
        }

        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(move || store.init())
            .await
            .map_err(|e| Error::StoreInit(e.to_string()))
            .and_then(|init| init);
        self.flight.finish(outcome)?;

        self.inits.fetch_add(1, Ordering::SeqCst);
        *ready = true;
        info!(store = ?self.store, "Backing store ready");
        Ok(())
    }

    /// Forget readiness so the next [`ensure_ready`](Self::ensure_ready)
    /// re-initializes the store.
    pub async fn reset(&self) {
        *self.ready.lock().await = false;
    }

    pub fn load(&self, conn: &mut Connection) -> Result<bool, Error> {
        self.store.load(conn)
    }

    pub fn flush(&self, conn: &Connection) -> Result<(), Error> {
        self.store.flush(conn)
    }

    /// Number of completed store initializations.
    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct CountingStore {
        inits: AtomicUsize,
    }

    impl SnapshotStore for CountingStore {
        fn init(&self) -> Result<(), Error> {
            std::thread::sleep(Duration::from_millis(20));
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn load(&self, _conn: &mut Connection) -> Result<bool, Error> {
            Ok(false)
        }

        fn flush(&self, _conn: &Connection) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested").join("kith.db"));
        store.init().unwrap();

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT); INSERT INTO t VALUES ('kept');")
            .unwrap();
        store.flush(&conn).unwrap();
        assert!(store.path().exists());

        let mut fresh = Connection::open_in_memory().unwrap();
        assert!(store.load(&mut fresh).unwrap());
        let v: String = fresh.query_row("SELECT v FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(v, "kept");
    }

    #[test]
    fn test_file_store_load_missing() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("absent.db"));
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(!store.load(&mut conn).unwrap());
    }

    #[test]
    fn test_memory_store_survives_reconnect() {
        let store = MemorySnapshotStore::new();
        let mut first = Connection::open_in_memory().unwrap();
        assert!(!store.load(&mut first).unwrap());
        first.execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (7);").unwrap();
        store.flush(&first).unwrap();
        drop(first);

        let mut second = Connection::open_in_memory().unwrap();
        assert!(store.load(&mut second).unwrap());
        let n: i64 = second.query_row("SELECT n FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 7);
    }

    #[derive(Debug, Default)]
    struct OfflineStore {
        attempts: AtomicUsize,
    }

    impl SnapshotStore for OfflineStore {
        fn init(&self) -> Result<(), Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Err(Error::StoreInit("quota exceeded".to_string()))
        }

        fn load(&self, _conn: &mut Connection) -> Result<bool, Error> {
            Ok(false)
        }

        fn flush(&self, _conn: &Connection) -> Result<(), Error> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failed_init_runs_once() {
        let store = Arc::new(OfflineStore::default());
        let bridge = Arc::new(PersistenceBridge::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let bridge = Arc::clone(&bridge);
            handles.push(tokio::spawn(async move { bridge.ensure_ready().await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.to_string().contains("quota exceeded"));
        }

        assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.init_count(), 0);
    }

    #[test]
    fn test_memory_store_overwrites_previous_image() {
        let store = MemorySnapshotStore::new();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();
        store.flush(&conn).unwrap();
        conn.execute("UPDATE t SET n = 2", []).unwrap();
        store.flush(&conn).unwrap();

        let mut fresh = Connection::open_in_memory().unwrap();
        assert!(store.load(&mut fresh).unwrap());
        let n: i64 = fresh.query_row("SELECT n FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_init_runs_once() {
        let store = Arc::new(CountingStore::default());
        let bridge = Arc::new(PersistenceBridge::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let bridge = Arc::clone(&bridge);
            handles.push(tokio::spawn(async move { bridge.ensure_ready().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.inits.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.init_count(), 1);

        bridge.reset().await;
        bridge.ensure_ready().await.unwrap();
        assert_eq!(store.inits.load(Ordering::SeqCst), 2);
    }
}
