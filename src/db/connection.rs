//! Lifecycle of the single database connection.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::bridge::{PersistenceBridge, SnapshotStore};
use super::flight::{Flight, Ticket};
use crate::error::Error;

/// Where the database lives.
#[derive(Debug, Clone)]
pub enum Platform {
    /// File-backed SQLite; writes are durable as soon as they commit.
    Native { path: PathBuf },
    /// In-memory SQLite mirrored into a durable [`SnapshotStore`].
    Bridged { store: Arc<dyn SnapshotStore> },
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Native { .. } => "native",
            Platform::Bridged { .. } => "bridged",
        }
    }
}

/// Owns zero or one live connection.
pub struct ConnectionManager {
    platform: Platform,
    bridge: Option<PersistenceBridge>,
    conn: Mutex<Option<Connection>>,
    flight: Flight,
    opened: AtomicUsize,
}

impl ConnectionManager {
    pub fn new(platform: Platform) -> Self {
        let bridge = match &platform {
            Platform::Native { .. } => None,
            Platform::Bridged { store } => Some(PersistenceBridge::new(Arc::clone(store))),
        };
        Self {
            platform,
            bridge,
            conn: Mutex::new(None),
            flight: Flight::default(),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn bridge(&self) -> Option<&PersistenceBridge> {
        self.bridge.as_ref()
    }

    /// Number of connections created over the manager's lifetime.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Whether a connection is currently held.
    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Open the connection unless one is already held.
    ///
    /// The slot is checked and filled under one lock, so callers that arrive
    /// while an open is in flight wait for it and reuse its connection. If
    /// that open fails, every waiter receives its error.
    pub async fn open(&self) -> Result<(), Error> {
        let ticket = self.flight.arrive();
        let mut slot = self.conn.lock().await;
        self.ensure_open(&mut slot, ticket).await.map(|_| ())
    }

    /// Run `f` against the open connection, opening it first if needed.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Connection) -> Result<T, Error>,
    {
        let ticket = self.flight.arrive();
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_open(&mut slot, ticket).await?;
        f(conn)
    }

    /// Close the connection. No-op when nothing is open.
    pub async fn close(&self) -> Result<(), Error> {
        let mut slot = self.conn.lock().await;
        match slot.take() {
            Some(conn) => {
                conn.close().map_err(|(_, e)| Error::Sqlite(e))?;
                info!("Database connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Write the in-memory image to the backing store. No-op on native.
    pub async fn flush(&self) -> Result<(), Error> {
        let Some(bridge) = &self.bridge else {
            return Ok(());
        };
        let slot = self.conn.lock().await;
        match slot.as_ref() {
            Some(conn) => bridge.flush(conn),
            None => Ok(()),
        }
    }

    /// Discard the current connection after a transient failure.
    ///
    /// Bridged images get a best-effort flush first. After a short pause the
    /// backing store is re-initialized; the next open creates a fresh
    /// connection.
    pub async fn recover(&self, pause: Duration) -> Result<(), Error> {
        {
            let mut slot = self.conn.lock().await;
            if let Some(conn) = slot.take() {
                if let Some(bridge) = &self.bridge {
                    if let Err(e) = bridge.flush(&conn) {
                        warn!(error = %e, "Flush before reconnect failed");
                    }
                }
                if let Err((_, e)) = conn.close() {
                    warn!(error = %e, "Closing failed connection reported an error");
                }
            }
        }

        tokio::time::sleep(pause).await;

        if let Some(bridge) = &self.bridge {
            bridge.reset().await;
            bridge.ensure_ready().await?;
        }
        info!("Connection discarded for recovery");
        Ok(())
    }

    async fn ensure_open<'a>(
        &self,
        slot: &'a mut MutexGuard<'_, Option<Connection>>,
        ticket: Ticket,
    ) -> Result<&'a mut Connection, Error> {
        if slot.is_none() {
            if let Some(err) = self.flight.failure_since(ticket) {
                return Err(err);
            }
            let conn = self.flight.finish(self.connect().await)?;
            **slot = Some(conn);
        }
        slot.as_mut().ok_or(Error::ConnectionClosed)
    }

    async fn connect(&self) -> Result<Connection, Error> {
        if let Some(bridge) = &self.bridge {
            bridge.ensure_ready().await?;
        }

        let mut conn = match &self.platform {
            Platform::Native { path } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
            Platform::Bridged { .. } => Connection::open_in_memory()?,
        };

        if let Some(bridge) = &self.bridge {
            match bridge.load(&mut conn) {
                Ok(loaded) => debug!(loaded, "Snapshot load finished"),
                Err(e) => {
                    if let Err((_, close_err)) = conn.close() {
                        warn!(error = %close_err, "Failed to close partial connection");
                    }
                    return Err(e);
                }
            }
        }

        if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON;") {
            warn!(error = %e, "Could not enable foreign key enforcement");
        }

        let count = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        info!(platform = self.platform.name(), count, "Database connection opened");
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bridge::MemorySnapshotStore;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn init(&self) -> Result<(), Error> {
            Err(Error::StoreInit("quota exceeded".to_string()))
        }

        fn load(&self, _conn: &mut Connection) -> Result<bool, Error> {
            Ok(false)
        }

        fn flush(&self, _conn: &Connection) -> Result<(), Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_open_reuses_connection() {
        let dir = tempdir().unwrap();
        let manager = ConnectionManager::new(Platform::Native {
            path: dir.path().join("kith.db"),
        });

        manager.open().await.unwrap();
        manager.open().await.unwrap();
        assert_eq!(manager.connections_opened(), 1);
        assert!(manager.is_open().await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let manager = ConnectionManager::new(Platform::Bridged {
            store: Arc::new(MemorySnapshotStore::new()),
        });
        manager.close().await.unwrap();
        manager.open().await.unwrap();
        manager.close().await.unwrap();
        manager.close().await.unwrap();
        assert!(!manager.is_open().await);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let manager = ConnectionManager::new(Platform::Bridged {
            store: Arc::new(MemorySnapshotStore::new()),
        });
        let enabled: i64 = manager
            .with_connection(|conn| {
                Ok(conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_store_init_failure_propagates() {
        let manager = ConnectionManager::new(Platform::Bridged {
            store: Arc::new(BrokenStore),
        });
        let err = manager.open().await.unwrap_err();
        assert!(matches!(err.root(), Error::StoreInit(_)));
        assert!(!manager.is_open().await);
        assert_eq!(manager.connections_opened(), 0);
    }

    #[tokio::test]
    async fn test_recover_opens_fresh_connection() {
        let manager = ConnectionManager::new(Platform::Bridged {
            store: Arc::new(MemorySnapshotStore::new()),
        });
        manager
            .with_connection(|conn| {
                conn.execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (1);")?;
                Ok(())
            })
            .await
            .unwrap();

        manager.recover(Duration::from_millis(1)).await.unwrap();
        assert!(!manager.is_open().await);

        let n: i64 = manager
            .with_connection(|conn| Ok(conn.query_row("SELECT n FROM t", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(manager.connections_opened(), 2);
        assert_eq!(manager.bridge().map(|b| b.init_count()), Some(2));
    }
}
