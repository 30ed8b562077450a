//! Data-access façade over the single embedded SQLite database.
//!
//! Every operation opens the connection on demand, retries once after a
//! transient connection failure, and flushes the image to the backing store
//! after writes on bridged platforms.

mod bridge;
mod connection;
mod flight;
mod row;
mod schema;
mod splitter;

pub use bridge::{FileSnapshotStore, MemorySnapshotStore, PersistenceBridge, SnapshotStore};
pub use connection::{ConnectionManager, Platform};
pub use row::{bool_from_int, escape_like, from_json, to_json, Row};
pub use schema::{SeedProfile, DEFAULT_USER_NAME, LOCAL_USER_ID, SCHEMA, SCHEMA_VERSION};
pub use splitter::split_statements;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, Params};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Error, ErrorClass};

/// Default pause before reconnecting after a transient failure.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default pause after save-and-close.
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Full dump of every user table, keyed by table name.
pub type Export = BTreeMap<String, Vec<Row>>;

/// Timing knobs for the façade.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    pub retry_delay: Duration,
    pub settle_delay: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Outcome of [`Database::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Whether the whole script ran as one atomic batch.
    pub atomic: bool,
    /// Statements that ran successfully.
    pub applied: usize,
    /// Statements that failed and were skipped.
    pub failed: usize,
}

/// Outcome of [`Database::import`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub tables: usize,
    pub rows: usize,
    pub failed_rows: usize,
    pub skipped_tables: Vec<String>,
}

struct Inner {
    manager: ConnectionManager,
    options: DatabaseOptions,
    initialized: OnceCell<u32>,
}

/// Shared handle to the database. Clones refer to the same connection.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    pub fn new(platform: Platform, options: DatabaseOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager: ConnectionManager::new(platform),
                options,
                initialized: OnceCell::new(),
            }),
        }
    }

    /// File-backed database at `path`.
    pub fn native(path: impl Into<PathBuf>) -> Self {
        Self::new(Platform::Native { path: path.into() }, DatabaseOptions::default())
    }

    /// In-memory database mirrored into `store`.
    pub fn bridged(store: Arc<dyn SnapshotStore>) -> Self {
        Self::new(Platform::Bridged { store }, DatabaseOptions::default())
    }

    /// In-memory database for testing. Contents survive reconnects but not
    /// the process.
    pub fn open_memory() -> Self {
        Self::new(
            Platform::Bridged {
                store: Arc::new(MemorySnapshotStore::new()),
            },
            DatabaseOptions {
                retry_delay: Duration::from_millis(1),
                settle_delay: Duration::ZERO,
            },
        )
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.inner.manager
    }

    pub fn platform(&self) -> &Platform {
        self.inner.manager.platform()
    }

    /// Open the connection ahead of first use.
    pub async fn open(&self) -> Result<(), Error> {
        self.inner.manager.open().await
    }

    /// Close the connection without flushing.
    pub async fn close(&self) -> Result<(), Error> {
        self.inner.manager.close().await
    }

    // ========== Schema ==========

    /// Run the schema bootstrap once for this handle and its clones.
    ///
    /// Concurrent callers share the single in-flight run. Returns the stored
    /// schema version.
    pub async fn initialize(&self, seed: &SeedProfile) -> Result<u32, Error> {
        self.inner
            .initialized
            .get_or_try_init(|| schema::bootstrap(self, seed))
            .await
            .copied()
    }

    /// Stored schema version; 0 means uninitialized.
    pub async fn schema_version(&self) -> Result<u32, Error> {
        self.with_connection(|conn| {
            Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
        })
        .await
    }

    pub async fn set_schema_version(&self, version: u32) -> Result<(), Error> {
        self.with_connection(|conn| {
            conn.pragma_update(None, "user_version", version)?;
            Ok(())
        })
        .await?;
        self.flush_logged().await;
        Ok(())
    }

    // ========== Statements ==========

    /// Run a possibly multi-statement script.
    ///
    /// The script first runs as one atomic batch. If that fails it is split
    /// and each statement runs on its own; failing statements are logged and
    /// skipped. When the batch failed because a transaction is already
    /// active, the statements run inside that transaction without
    /// reconnecting.
    pub async fn execute(&self, script: &str) -> Result<BatchReport, Error> {
        let outcome = self
            .inner
            .manager
            .with_connection(|conn| Ok(run_atomic(conn, script)))
            .await?;

        let report = match outcome {
            Ok(applied) => BatchReport {
                atomic: true,
                applied,
                failed: 0,
            },
            Err(e) if e.is_nested_transaction() => {
                debug!("Transaction already active, running statements individually");
                self.run_individually(script).await?
            }
            Err(e) if e.class() == ErrorClass::Transient => {
                warn!(error = %e, "Batch hit a transient failure, reconnecting");
                self.recover().await?;
                self.run_individually(script).await?
            }
            Err(e) => {
                warn!(error = %e, "Batch failed, falling back to individual statements");
                self.run_individually(script).await?
            }
        };

        self.flush_logged().await;
        Ok(report)
    }

    /// Like [`execute`](Self::execute) but all-or-nothing: a failing
    /// statement rolls back the batch and the error is returned.
    pub async fn execute_strict(&self, script: &str) -> Result<BatchReport, Error> {
        let applied = self
            .with_connection(|conn| run_atomic(conn, script))
            .await?;
        self.flush_logged().await;
        Ok(BatchReport {
            atomic: true,
            applied,
            failed: 0,
        })
    }

    /// Parameterized read. No matches yields an empty vector.
    pub async fn query<P>(&self, sql: &str, params: P) -> Result<Vec<Row>, Error>
    where
        P: Params + Clone,
    {
        self.with_connection(|conn| row::query_rows(conn, sql, params.clone()))
            .await
    }

    /// Parameterized read deserialized into `T`.
    pub async fn query_as<T, P>(&self, sql: &str, params: P) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
        P: Params + Clone,
    {
        self.query(sql, params)
            .await?
            .into_iter()
            .map(|row| Ok(serde_json::from_value(serde_json::Value::Object(row))?))
            .collect()
    }

    /// First row of [`query_as`](Self::query_as), if any.
    pub async fn query_one<T, P>(&self, sql: &str, params: P) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
        P: Params + Clone,
    {
        Ok(self.query_as(sql, params).await?.into_iter().next())
    }

    /// Parameterized write. Returns the number of rows changed.
    pub async fn run<P>(&self, sql: &str, params: P) -> Result<usize, Error>
    where
        P: Params + Clone,
    {
        let changed = self
            .with_connection(|conn| Ok(conn.execute(sql, params.clone())?))
            .await?;
        self.flush_logged().await;
        Ok(changed)
    }

    /// Run `f` against the connection with the transient-retry policy: on a
    /// transient failure the connection is discarded, reopened, and `f` runs
    /// once more. A second failure is returned.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: Fn(&mut Connection) -> Result<T, Error>,
    {
        match self.inner.manager.with_connection(&f).await {
            Err(e) if e.class() == ErrorClass::Transient => {
                warn!(error = %e, "Transient database failure, retrying once");
                self.recover().await?;
                self.inner.manager.with_connection(&f).await
            }
            other => other,
        }
    }

    // ========== Backup ==========

    /// Dump every user table.
    pub async fn export(&self) -> Result<Export, Error> {
        let tables = self.user_tables().await?;
        let mut export = Export::new();
        for table in tables {
            let rows = self
                .query(&format!("SELECT * FROM {}", quote_ident(&table)), [])
                .await?;
            export.insert(table, rows);
        }
        info!(tables = export.len(), "Exported database");
        Ok(export)
    }

    /// Load rows in the export format, replacing rows with the same key.
    ///
    /// Unknown tables and columns are skipped. Rows are inserted parents
    /// first; a failing row is logged and counted.
    pub async fn import(&self, data: &serde_json::Value) -> Result<ImportReport, Error> {
        let serde_json::Value::Object(tables) = data else {
            return Err(Error::InvalidValue(
                "import document must be an object keyed by table".to_string(),
            ));
        };

        let known = self.user_tables().await?;
        let mut report = ImportReport::default();

        for table in ordered_for_import(&known) {
            let Some(rows) = tables.get(table.as_str()) else {
                continue;
            };
            let Some(rows) = rows.as_array() else {
                warn!(table = %table, "Import value is not an array, skipping");
                report.skipped_tables.push(table.clone());
                continue;
            };

            let columns = self.table_columns(&table).await?;
            report.tables += 1;

            for row in rows {
                let Some(obj) = row.as_object() else {
                    report.failed_rows += 1;
                    continue;
                };
                let fields: Vec<(&String, &serde_json::Value)> =
                    obj.iter().filter(|(k, _)| columns.contains(*k)).collect();
                if fields.is_empty() {
                    report.failed_rows += 1;
                    continue;
                }

                let names: Vec<String> = fields.iter().map(|(k, _)| quote_ident(k)).collect();
                let placeholders: Vec<String> =
                    (1..=fields.len()).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
                    quote_ident(&table),
                    names.join(", "),
                    placeholders.join(", ")
                );
                let values: Vec<rusqlite::types::Value> =
                    fields.iter().map(|(_, v)| from_json(v)).collect();

                match self
                    .run(&sql, rusqlite::params_from_iter(values.iter()))
                    .await
                {
                    Ok(_) => report.rows += 1,
                    Err(e) => {
                        warn!(table = %table, error = %e, "Import row failed");
                        report.failed_rows += 1;
                    }
                }
            }
        }

        for name in tables.keys() {
            if !known.contains(name) {
                warn!(table = %name, "Unknown table in import, skipping");
                report.skipped_tables.push(name.clone());
            }
        }

        info!(
            tables = report.tables,
            rows = report.rows,
            failed = report.failed_rows,
            "Import finished"
        );
        Ok(report)
    }

    /// Names of all non-internal tables, sorted.
    pub async fn user_tables(&self) -> Result<Vec<String>, Error> {
        let rows = self
            .query(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
                 ORDER BY name",
                [],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| match row.remove("name") {
                Some(serde_json::Value::String(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    async fn table_columns(&self, table: &str) -> Result<HashSet<String>, Error> {
        let rows = self
            .query("SELECT name FROM pragma_table_info(?1)", [table])
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| match row.remove("name") {
                Some(serde_json::Value::String(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    // ========== Persistence ==========

    /// Flush the image to the backing store, propagating failure.
    pub async fn flush(&self) -> Result<(), Error> {
        self.inner.manager.flush().await
    }

    /// Flush, close, then pause so the backing store settles before the
    /// caller moves on. Flush failure is returned and the connection stays
    /// open.
    pub async fn save_and_close(&self) -> Result<(), Error> {
        self.inner.manager.flush().await?;
        self.inner.manager.close().await?;
        tokio::time::sleep(self.inner.options.settle_delay).await;
        debug!("Saved and closed");
        Ok(())
    }

    async fn flush_logged(&self) {
        if let Err(e) = self.inner.manager.flush().await {
            warn!(error = %e, "Persistence flush failed");
        }
    }

    async fn recover(&self) -> Result<(), Error> {
        self.inner
            .manager
            .recover(self.inner.options.retry_delay)
            .await
    }

    async fn run_individually(&self, script: &str) -> Result<BatchReport, Error> {
        let statements = split_statements(script);
        self.inner
            .manager
            .with_connection(|conn| {
                let mut report = BatchReport::default();
                for (idx, stmt) in statements.iter().enumerate() {
                    match conn.execute_batch(stmt) {
                        Ok(()) => report.applied += 1,
                        Err(e) => {
                            warn!(index = idx, error = %e, statement = %stmt, "Statement failed, continuing");
                            report.failed += 1;
                        }
                    }
                }
                Ok(report)
            })
            .await
    }
}

/// Run `script` inside one transaction. Returns the statement count.
fn run_atomic(conn: &mut Connection, script: &str) -> Result<usize, Error> {
    let tx = conn.transaction()?;
    tx.execute_batch(script)?;
    tx.commit()?;
    Ok(split_statements(script).len())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Parents before children so foreign keys resolve during import.
fn ordered_for_import(known: &[String]) -> Vec<String> {
    const ORDER: [&str; 7] = [
        "user",
        "contact",
        "interaction",
        "cognitive_unit",
        "insight",
        "reminder",
        "ai_processing_log",
    ];
    let mut ordered: Vec<String> = ORDER
        .iter()
        .filter(|t| known.iter().any(|k| k == *t))
        .map(|t| t.to_string())
        .collect();
    ordered.extend(known.iter().filter(|k| !ORDER.contains(&k.as_str())).cloned());
    ordered
}
