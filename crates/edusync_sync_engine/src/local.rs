//! Typed access to an entity type's local flat file.

use crate::error::{SyncError, SyncResult};
use edusync_core::{Entity, Row};
use edusync_storage::TransactionalFileStore;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads and replaces the local records of one entity type.
pub trait LocalDataPort<T: Entity>: Send + Sync {
    /// Reads every record in file order.
    ///
    /// Malformed rows are logged and skipped.
    fn read_all(&self) -> SyncResult<Vec<T>>;

    /// Replaces the file contents with `records`, all-or-nothing.
    fn write_all(&self, records: &[T]) -> SyncResult<()>;
}

/// A [`LocalDataPort`] over a CSV file.
///
/// The first row is a header. Columns are matched by name, so their
/// physical order may differ from [`Entity::COLUMNS`]. Files are always
/// written in `COLUMNS` order. A missing file reads as empty.
#[derive(Debug)]
pub struct CsvLocalPort<T> {
    store: TransactionalFileStore,
    path: PathBuf,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> CsvLocalPort<T> {
    /// Creates a port for the file at `path`.
    pub fn new(store: TransactionalFileStore, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            _entity: PhantomData,
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn local_error(&self, reason: impl ToString) -> SyncError {
        SyncError::LocalData {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn decode(&self, bytes: &[u8]) -> SyncResult<Vec<T>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| self.local_error(e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let missing = T::missing_columns(&header);
        if !missing.is_empty() {
            return Err(self.local_error(format!(
                "header lacks columns: {}",
                missing.join(", ")
            )));
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (index, result) in reader.records().enumerate() {
            let line = index + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %self.path.display(), line, error = %e, "skipping unreadable row");
                    skipped += 1;
                    continue;
                }
            };
            let values: Vec<&str> = record.iter().collect();
            match Row::new(&header, &values).and_then(|row| T::from_row(&row)) {
                Ok(entity) => records.push(entity),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        entity = T::TYPE_NAME,
                        line,
                        error = %e,
                        "skipping malformed row"
                    );
                    skipped += 1;
                }
            }
        }

        debug!(
            path = %self.path.display(),
            records = records.len(),
            skipped,
            "read local records"
        );
        Ok(records)
    }

    fn encode(&self, records: &[T]) -> SyncResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(T::COLUMNS)
            .map_err(|e| self.local_error(e))?;
        for record in records {
            writer
                .write_record(record.to_row())
                .map_err(|e| self.local_error(e))?;
        }
        writer.into_inner().map_err(|e| self.local_error(e.error()))
    }
}

impl<T: Entity> LocalDataPort<T> for CsvLocalPort<T> {
    fn read_all(&self) -> SyncResult<Vec<T>> {
        match fs::read(&self.path) {
            Ok(bytes) => self.decode(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(SyncError::Store(e.into())),
        }
    }

    fn write_all(&self, records: &[T]) -> SyncResult<()> {
        let bytes = self.encode(records)?;
        self.store.with_transaction([&self.path], |tx| {
            tx.write(&self.path, &bytes)?;
            Ok::<_, SyncError>(())
        })?;
        debug!(path = %self.path.display(), records = records.len(), "wrote local records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edusync_core::{Task, TaskStatus};
    use tempfile::tempdir;

    fn port(dir: &Path) -> CsvLocalPort<Task> {
        CsvLocalPort::new(TransactionalFileStore::new(), dir.join("tasks.csv"))
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(port(dir.path()).read_all().unwrap().is_empty());
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let port = port(dir.path());
        let tasks = vec![
            Task::new("Plan lessons").with_status(TaskStatus::Done),
            Task::new("Mark quiz, part \"B\"").with_priority(1),
        ];

        port.write_all(&tasks).unwrap();
        assert_eq!(port.read_all().unwrap(), tasks);

        let text = fs::read_to_string(port.path()).unwrap();
        assert!(text.starts_with("id,project_id,title,description,status,priority,due_date,updated_at\n"));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let port = port(dir.path());
        let good = Task::new("Keep me");
        port.write_all(std::slice::from_ref(&good)).unwrap();

        let mut text = fs::read_to_string(port.path()).unwrap();
        text.push_str("not-a-uuid,,Broken,,todo,3,,2024-01-01T00:00:00Z\n");
        text.push_str("too,few\n");
        fs::write(port.path(), text).unwrap();

        assert_eq!(port.read_all().unwrap(), vec![good]);
    }

    #[test]
    fn header_order_does_not_matter() {
        let dir = tempdir().unwrap();
        let port = port(dir.path());
        fs::write(
            port.path(),
            "title,id,project_id,description,status,priority,due_date,updated_at\n\
             Reordered,5b7f4c1e-9a7d-4c53-8d0e-2f1a3b4c5d6e,,,todo,2,,2024-03-01T10:00:00.000Z\n",
        )
        .unwrap();

        let tasks = port.read_all().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Reordered");
        assert_eq!(tasks[0].priority, 2);
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = tempdir().unwrap();
        let port = port(dir.path());
        fs::write(port.path(), "id,title\n").unwrap();
        assert!(matches!(
            port.read_all(),
            Err(SyncError::LocalData { .. })
        ));
    }

    #[test]
    fn write_fails_on_lock_conflict() {
        let dir = tempdir().unwrap();
        let store = TransactionalFileStore::new();
        let port: CsvLocalPort<Task> = CsvLocalPort::new(store.clone(), dir.path().join("tasks.csv"));

        let held = store.begin_transaction([port.path()]).unwrap();
        let err = port.write_all(&[Task::new("blocked")]).unwrap_err();
        assert!(matches!(err, SyncError::Store(ref e) if e.is_lock_conflict()));
        store.rollback_transaction(held).unwrap();

        assert!(port.write_all(&[Task::new("free")]).is_ok());
    }
}
