//! Typed access to an entity type's remote table.

use crate::config::RetryConfig;
use crate::error::{RemoteError, SyncError, SyncResult};
use crate::retry::{run_with_retry, RetryError};
use edusync_core::{Entity, Row};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params_from_iter, Connection, ErrorCode, TransactionBehavior};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A transactional relational store holding one table per entity type.
///
/// Rows are exchanged as text values in the order of `columns`. The first
/// column is the record identifier.
pub trait RemoteClient: Send + Sync {
    /// Reads every row of `table` in one read-only transaction.
    fn fetch_all(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<String>>, RemoteError>;

    /// Upserts `rows` into `table` in one write transaction.
    ///
    /// Rows whose identifier exists are overwritten, others are inserted.
    /// Rows absent from `rows` are left alone.
    fn upsert_all(&self, table: &str, columns: &[&str], rows: &[Vec<String>]) -> Result<(), RemoteError>;
}

/// Reads and writes the remote records of one entity type.
pub trait RemoteDataPort<T: Entity>: Send + Sync {
    /// Reads every remote record.
    fn read_all(&self) -> SyncResult<Vec<T>>;

    /// Upserts `records` by identifier. Never deletes.
    fn write_all(&self, records: &[T]) -> SyncResult<()>;
}

/// A [`RemoteDataPort`] over a [`RemoteClient`] with bounded retry.
///
/// Transient client failures are retried per the [`RetryConfig`]. Fatal
/// failures propagate immediately.
pub struct RelationalRemotePort<T> {
    client: Arc<dyn RemoteClient>,
    table: String,
    retry: RetryConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> RelationalRemotePort<T> {
    /// Creates a port for `table`.
    pub fn new(client: Arc<dyn RemoteClient>, table: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client,
            table: table.into(),
            retry,
            _entity: PhantomData,
        }
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn retrying<R>(
        &self,
        operation: &str,
        op: impl FnMut() -> Result<R, RemoteError>,
    ) -> SyncResult<R> {
        run_with_retry(&self.retry, operation, RemoteError::is_transient, op).map_err(|e| match e {
            RetryError::Fatal(e) => SyncError::Remote(e),
            RetryError::Exhausted { attempts, last } => SyncError::RetriesExhausted { attempts, last },
        })
    }
}

impl<T: Entity> RemoteDataPort<T> for RelationalRemotePort<T> {
    fn read_all(&self) -> SyncResult<Vec<T>> {
        let rows = self.retrying("remote read", || self.client.fetch_all(&self.table, T::COLUMNS))?;

        let mut records = Vec::with_capacity(rows.len());
        for values in &rows {
            match Row::new(T::COLUMNS, values).and_then(|row| T::from_row(&row)) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    table = %self.table,
                    entity = T::TYPE_NAME,
                    error = %e,
                    "skipping malformed remote row"
                ),
            }
        }
        debug!(table = %self.table, records = records.len(), "read remote records");
        Ok(records)
    }

    fn write_all(&self, records: &[T]) -> SyncResult<()> {
        let rows: Vec<Vec<String>> = records.iter().map(|r| r.to_row()).collect();
        self.retrying("remote write", || self.client.upsert_all(&self.table, T::COLUMNS, &rows))?;
        debug!(table = %self.table, records = rows.len(), "upserted remote records");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl MemoryTable {
    fn position(&self, column: &str) -> Result<usize, RemoteError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| RemoteError::fatal(format!("no such column: {column}")))
    }
}

/// An in-memory [`RemoteClient`] with the same upsert semantics as SQL.
///
/// Tables are created on first use. Rows keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryRemoteClient {
    tables: RwLock<HashMap<String, MemoryTable>>,
    upserts: AtomicU64,
}

impl MemoryRemoteClient {
    /// Creates an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every row of `table` in column order, or `None` if the table
    /// does not exist.
    pub fn rows(&self, table: &str) -> Option<Vec<Vec<String>>> {
        self.tables.read().get(table).map(|t| t.rows.clone())
    }

    /// Returns how many upsert transactions were applied.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl RemoteClient for MemoryRemoteClient {
    fn fetch_all(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<String>>, RemoteError> {
        let tables = self.tables.read();
        let Some(stored) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let positions = columns
            .iter()
            .map(|c| stored.position(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stored
            .rows
            .iter()
            .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }

    fn upsert_all(&self, table: &str, columns: &[&str], rows: &[Vec<String>]) -> Result<(), RemoteError> {
        if columns.is_empty() {
            return Err(RemoteError::fatal("no columns"));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(RemoteError::fatal(format!(
                "row has {} values for {} columns",
                bad.len(),
                columns.len()
            )));
        }

        let mut tables = self.tables.write();
        let stored = tables
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ..MemoryTable::default()
            });
        let positions = columns
            .iter()
            .map(|c| stored.position(c))
            .collect::<Result<Vec<_>, _>>()?;
        let width = stored.columns.len();

        for row in rows {
            let id = row[0].clone();
            match stored.index.get(&id) {
                Some(&i) => {
                    for (value, &p) in row.iter().zip(&positions) {
                        stored.rows[i][p] = value.clone();
                    }
                }
                None => {
                    let mut values = vec![String::new(); width];
                    for (value, &p) in row.iter().zip(&positions) {
                        values[p] = value.clone();
                    }
                    stored.index.insert(id, stored.rows.len());
                    stored.rows.push(values);
                }
            }
        }

        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`RemoteClient`] backed by SQLite.
///
/// Each table has `TEXT` columns with the first one as primary key, and is
/// created on first use. Busy and locked database errors are transient,
/// every other error is fatal.
pub struct SqliteRemoteClient {
    conn: Mutex<Connection>,
}

impl SqliteRemoteClient {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RemoteError> {
        let conn = Connection::open(path.as_ref()).map_err(|e| classify("open database", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, RemoteError> {
        let conn = Connection::open_in_memory().map_err(|e| classify("open database", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Sets how long SQLite waits on a locked database before failing.
    pub fn set_busy_timeout(&self, timeout: std::time::Duration) -> Result<(), RemoteError> {
        self.conn
            .lock()
            .busy_timeout(timeout)
            .map_err(|e| classify("set busy timeout", e))
    }

    fn ensure_table(conn: &Connection, table: &str, columns: &[&str]) -> Result<(), RemoteError> {
        let (id, rest) = columns
            .split_first()
            .ok_or_else(|| RemoteError::fatal("no columns"))?;
        let mut defs = vec![format!("{} TEXT PRIMARY KEY", quote(id)?)];
        for column in rest {
            defs.push(format!("{} TEXT", quote(column)?));
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(table)?,
            defs.join(", ")
        );
        conn.execute_batch(&sql)
            .map_err(|e| classify("create table", e))
    }
}

impl RemoteClient for SqliteRemoteClient {
    fn fetch_all(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<String>>, RemoteError> {
        let mut conn = self.conn.lock();
        Self::ensure_table(&conn, table, columns)?;

        let select = columns
            .iter()
            .map(|c| quote(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let sql = format!("SELECT {select} FROM {} ORDER BY rowid", quote(table)?);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(|e| classify("begin read", e))?;
        let rows = {
            let mut stmt = tx.prepare(&sql).map_err(|e| classify("prepare read", e))?;
            let width = columns.len();
            let mapped = stmt
                .query_map([], |row| {
                    (0..width)
                        .map(|i| row.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
                        .collect::<Result<Vec<_>, _>>()
                })
                .map_err(|e| classify("read", e))?;
            let collected: Result<Vec<_>, _> = mapped.collect();
            collected.map_err(|e| classify("read", e))?
        };
        tx.commit().map_err(|e| classify("end read", e))?;
        Ok(rows)
    }

    fn upsert_all(&self, table: &str, columns: &[&str], rows: &[Vec<String>]) -> Result<(), RemoteError> {
        let mut conn = self.conn.lock();
        Self::ensure_table(&conn, table, columns)?;

        let quoted = columns
            .iter()
            .map(|c| quote(c))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let updates: Vec<String> = quoted
            .iter()
            .skip(1)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let on_conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {on_conflict}",
            quote(table)?,
            quoted.join(", "),
            placeholders.join(", "),
            quoted[0],
        );

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| classify("begin write", e))?;
        {
            let mut stmt = tx.prepare(&sql).map_err(|e| classify("prepare upsert", e))?;
            for row in rows {
                if row.len() != columns.len() {
                    return Err(RemoteError::fatal(format!(
                        "row has {} values for {} columns",
                        row.len(),
                        columns.len()
                    )));
                }
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|e| classify("upsert", e))?;
            }
        }
        tx.commit().map_err(|e| classify("commit", e))?;
        debug!(table, rows = rows.len(), "sqlite upsert committed");
        Ok(())
    }
}

/// Quotes an identifier, accepting only `[A-Za-z0-9_]`.
fn quote(identifier: &str) -> Result<String, RemoteError> {
    let valid = !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("\"{identifier}\""))
    } else {
        Err(RemoteError::fatal(format!("invalid identifier: {identifier:?}")))
    }
}

fn classify(context: &str, err: rusqlite::Error) -> RemoteError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            RemoteError::transient(format!("{context}: {err}"))
        }
        _ => RemoteError::fatal(format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edusync_core::Task;
    use std::time::Duration;
    use tempfile::tempdir;

    const COLUMNS: &[&str] = &["id", "title"];

    fn row(id: &str, title: &str) -> Vec<String> {
        vec![id.to_string(), title.to_string()]
    }

    fn check_upsert_semantics(client: &dyn RemoteClient) {
        client
            .upsert_all("task", COLUMNS, &[row("1", "a"), row("2", "b")])
            .unwrap();
        client
            .upsert_all("task", COLUMNS, &[row("2", "B"), row("3", "c")])
            .unwrap();

        let rows = client.fetch_all("task", COLUMNS).unwrap();
        assert_eq!(rows, vec![row("1", "a"), row("2", "B"), row("3", "c")]);
    }

    #[test]
    fn memory_upsert_never_deletes() {
        check_upsert_semantics(&MemoryRemoteClient::new());
    }

    #[test]
    fn sqlite_upsert_never_deletes() {
        check_upsert_semantics(&SqliteRemoteClient::open_in_memory().unwrap());
    }

    #[test]
    fn missing_table_reads_empty() {
        let sqlite = SqliteRemoteClient::open_in_memory().unwrap();
        assert!(sqlite.fetch_all("project", COLUMNS).unwrap().is_empty());
        assert!(MemoryRemoteClient::new()
            .fetch_all("project", COLUMNS)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn column_order_follows_request() {
        let client = MemoryRemoteClient::new();
        client
            .upsert_all("task", COLUMNS, &[row("1", "a")])
            .unwrap();
        let rows = client.fetch_all("task", &["title", "id"]).unwrap();
        assert_eq!(rows, vec![row("a", "1")]);
    }

    #[test]
    fn rejected_batch_leaves_memory_table_untouched() {
        let client = MemoryRemoteClient::new();
        client.upsert_all("task", COLUMNS, &[row("1", "a")]).unwrap();
        let bad = vec![row("2", "b"), vec!["3".to_string()]];
        assert!(!client.upsert_all("task", COLUMNS, &bad).unwrap_err().is_transient());
        assert_eq!(client.rows("task").unwrap(), vec![row("1", "a")]);
        assert_eq!(client.upsert_count(), 1);
    }

    #[test]
    fn rejected_batch_rolls_back_sqlite() {
        let client = SqliteRemoteClient::open_in_memory().unwrap();
        client.upsert_all("task", COLUMNS, &[row("1", "a")]).unwrap();
        let bad = vec![row("2", "b"), vec!["3".to_string()]];
        assert!(client.upsert_all("task", COLUMNS, &bad).is_err());
        assert_eq!(client.fetch_all("task", COLUMNS).unwrap(), vec![row("1", "a")]);
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        let client = SqliteRemoteClient::open_in_memory().unwrap();
        let err = client
            .fetch_all("task; DROP TABLE task", COLUMNS)
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn locked_database_is_transient() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remote.db");
        let holder = SqliteRemoteClient::open(&path).unwrap();
        holder.upsert_all("task", COLUMNS, &[row("1", "a")]).unwrap();

        let contender = SqliteRemoteClient::open(&path).unwrap();
        contender.set_busy_timeout(Duration::ZERO).unwrap();

        let guard = holder.conn.lock();
        guard.execute_batch("BEGIN IMMEDIATE").unwrap();
        let err = contender
            .upsert_all("task", COLUMNS, &[row("2", "b")])
            .unwrap_err();
        guard.execute_batch("ROLLBACK").unwrap();

        assert!(err.is_transient(), "expected transient, got {err}");
    }

    #[test]
    fn port_round_trip() {
        let client: Arc<dyn RemoteClient> = Arc::new(SqliteRemoteClient::open_in_memory().unwrap());
        let port: RelationalRemotePort<Task> =
            RelationalRemotePort::new(Arc::clone(&client), "task", RetryConfig::new(1));
        let tasks = vec![Task::new("Collect permission slips"), Task::new("Book the bus")];

        port.write_all(&tasks).unwrap();
        assert_eq!(port.read_all().unwrap(), tasks);
    }
}
