//! Transactional file store.

use crate::artifact::{clear_stale, Backup};
use crate::error::{StoreError, StoreResult};
use crate::lock::LockRegistry;
use crate::transaction::{Resource, Transaction, TransactionId};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Locked, backed-up, rollback-capable access to local flat files.
///
/// Cloning the store shares its [`LockRegistry`], so every clone excludes
/// every other clone. Independent stores (for example in tests) do not
/// coordinate with each other.
///
/// # Protocol
///
/// 1. [`begin_transaction`](Self::begin_transaction) locks every path
///    (non-blocking, all-or-nothing) and backs each one up
/// 2. The caller reads and writes through the [`Transaction`]
/// 3. [`commit_transaction`](Self::commit_transaction) retires the backups,
///    or [`rollback_transaction`](Self::rollback_transaction) restores them
#[derive(Debug, Clone, Default)]
pub struct TransactionalFileStore {
    locks: Arc<LockRegistry>,
    next_id: Arc<AtomicU64>,
}

impl TransactionalFileStore {
    /// Creates a store with its own lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store sharing an existing lock registry.
    pub fn with_registry(locks: Arc<LockRegistry>) -> Self {
        Self {
            locks,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the lock registry.
    pub fn lock_registry(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// Begins a transaction over `paths`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::LockConflict`] if any path is locked by another
    ///   transaction. Locks acquired by this call are released first.
    /// - [`StoreError::BackupIo`] if a backup cannot be written. Locks and
    ///   partial backups are unwound first.
    /// - [`StoreError::Restore`] if an orphaned backup from a crashed
    ///   process cannot be restored.
    pub fn begin_transaction<I, P>(&self, paths: I) -> StoreResult<Transaction>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        paths.sort();
        paths.dedup();

        let id = TransactionId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let mut locks = Vec::with_capacity(paths.len());
        for path in &paths {
            match self.locks.try_acquire(path) {
                Some(lock) => locks.push(lock),
                None => {
                    warn!(tx = %id, path = %path.display(), "lock conflict, aborting transaction");
                    return Err(StoreError::LockConflict { path: path.clone() });
                }
            }
        }

        for path in &paths {
            recover_orphan(path)?;
        }

        let mut resources: Vec<Resource> = Vec::with_capacity(paths.len());
        for (path, lock) in paths.into_iter().zip(locks) {
            match Backup::create(&path) {
                Ok(backup) => resources.push(Resource { path, backup, lock }),
                Err(source) => {
                    for done in &resources {
                        if let Err(e) = done.backup.discard() {
                            warn!(
                                tx = %id,
                                path = %done.backup.artifact().display(),
                                error = %e,
                                "failed to discard partial backup"
                            );
                        }
                    }
                    warn!(tx = %id, path = %path.display(), error = %source, "backup failed, aborting transaction");
                    return Err(StoreError::BackupIo { path, source });
                }
            }
        }

        debug!(tx = %id, paths = resources.len(), "began transaction");
        Ok(Transaction::new(id, resources))
    }

    /// Commits a transaction: retires its backups, then releases its locks.
    pub fn commit_transaction(&self, tx: Transaction) -> StoreResult<()> {
        tx.commit()
    }

    /// Rolls back a transaction: restores its backups, then releases its locks.
    pub fn rollback_transaction(&self, tx: Transaction) -> StoreResult<()> {
        tx.rollback()
    }

    /// Runs `f` inside a transaction over `paths`.
    ///
    /// Commits if `f` returns `Ok`, rolls back if it returns `Err`. A panic
    /// in `f` rolls back when the transaction is dropped during unwinding.
    pub fn with_transaction<I, P, F, R, E>(&self, paths: I, f: F) -> Result<R, E>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        F: FnOnce(&mut Transaction) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut tx = self.begin_transaction(paths)?;
        match f(&mut tx) {
            Ok(value) => {
                self.commit_transaction(tx)?;
                Ok(value)
            }
            Err(err) => {
                // Restore failures are logged inside rollback
                let _ = self.rollback_transaction(tx);
                Err(err)
            }
        }
    }

    /// Restores backup artifacts left behind by a crashed process.
    ///
    /// Paths currently locked by a live transaction are skipped. Returns
    /// the paths that were restored.
    pub fn recover<I, P>(&self, paths: I) -> StoreResult<Vec<PathBuf>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut restored = Vec::new();
        for path in paths {
            let path = normalize_path(path.as_ref());
            let Some(_lock) = self.locks.try_acquire(&path) else {
                debug!(path = %path.display(), "skipping recovery of locked path");
                continue;
            };
            if recover_orphan(&path)? {
                restored.push(path);
            }
        }
        Ok(restored)
    }
}

/// Restores an orphaned backup of `path`. The caller must hold its lock.
///
/// Partial copies and retired backups are deleted, never restored.
fn recover_orphan(path: &Path) -> StoreResult<bool> {
    match clear_stale(path) {
        Ok(0) => {}
        Ok(removed) => debug!(path = %path.display(), removed, "removed stale artifacts"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale artifacts"),
    }
    let Some(orphan) = Backup::find_orphan(path) else {
        return Ok(false);
    };
    info!(
        path = %path.display(),
        artifact = %orphan.artifact().display(),
        "restoring orphaned backup"
    );
    orphan
        .restore(path)
        .map_err(|source| StoreError::Restore {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(true)
}

/// Resolves `path` to the key used for locking.
///
/// The parent directory is canonicalized; the file itself need not exist.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{absent_marker_path, backup_path};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn begin_creates_backups_and_locks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"id\n1\n").unwrap();

        let store = TransactionalFileStore::new();
        let tx = store.begin_transaction([&path]).unwrap();

        let key = normalize_path(&path);
        assert!(store.lock_registry().is_locked(&key));
        assert_eq!(fs::read(backup_path(&key)).unwrap(), b"id\n1\n");
        assert_eq!(tx.backup_path(&path), Some(backup_path(&key).as_path()));

        store.commit_transaction(tx).unwrap();
        assert!(!store.lock_registry().is_locked(&key));
        assert!(!backup_path(&key).exists());
    }

    #[test]
    fn rollback_restores_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"before").unwrap();

        let store = TransactionalFileStore::new();
        let mut tx = store.begin_transaction([&path]).unwrap();
        tx.write(&path, b"after").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"after");

        store.rollback_transaction(tx).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"before");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn commit_keeps_new_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"before").unwrap();

        let store = TransactionalFileStore::new();
        let mut tx = store.begin_transaction([&path]).unwrap();
        tx.write(&path, b"after").unwrap();
        store.commit_transaction(tx).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"after");
    }

    #[test]
    fn conflict_releases_partial_locks() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");

        let store = TransactionalFileStore::new();
        let holder = store.begin_transaction([&b]).unwrap();

        let err = store.begin_transaction([&a, &b]).unwrap_err();
        assert!(err.is_lock_conflict());

        // `a` sorts first and was acquired before the conflict on `b`
        assert!(!store.lock_registry().is_locked(&normalize_path(&a)));
        assert!(!absent_marker_path(&normalize_path(&a)).exists());

        store.commit_transaction(holder).unwrap();
        assert!(store.begin_transaction([&a, &b]).is_ok());
    }

    #[test]
    fn clones_share_locks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");

        let store = TransactionalFileStore::new();
        let other = store.clone();

        let _tx = store.begin_transaction([&path]).unwrap();
        assert!(other.begin_transaction([&path]).unwrap_err().is_lock_conflict());
    }

    #[test]
    fn absent_path_rollback_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.csv");

        let store = TransactionalFileStore::new();
        let mut tx = store.begin_transaction([&path]).unwrap();
        assert_eq!(tx.read(&path).unwrap(), None);

        tx.write(&path, b"id\n").unwrap();
        store.rollback_transaction(tx).unwrap();

        assert!(!path.exists());
        assert!(!absent_marker_path(&path).exists());
    }

    #[test]
    fn absent_path_commit_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.csv");

        let store = TransactionalFileStore::new();
        let mut tx = store.begin_transaction([&path]).unwrap();
        tx.write(&path, b"id\n").unwrap();
        store.commit_transaction(tx).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"id\n");
        assert!(!absent_marker_path(&path).exists());
    }

    #[test]
    fn drop_rolls_back_and_releases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"before").unwrap();

        let store = TransactionalFileStore::new();
        {
            let mut tx = store.begin_transaction([&path]).unwrap();
            tx.write(&path, b"after").unwrap();
        }

        assert_eq!(fs::read(&path).unwrap(), b"before");
        assert!(!store.lock_registry().is_locked(&normalize_path(&path)));
    }

    #[test]
    fn write_outside_transaction_fails() {
        let dir = tempdir().unwrap();
        let inside = dir.path().join("tasks.csv");
        let outside = dir.path().join("projects.csv");

        let store = TransactionalFileStore::new();
        let mut tx = store.begin_transaction([&inside]).unwrap();

        let err = tx.write(&outside, b"x").unwrap_err();
        assert!(matches!(err, StoreError::PathNotInTransaction { .. }));
        assert!(!outside.exists());
    }

    #[test]
    fn duplicate_paths_are_merged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");

        let store = TransactionalFileStore::new();
        let tx = store.begin_transaction([&path, &path]).unwrap();
        assert_eq!(tx.paths().count(), 1);
    }

    #[test]
    fn relative_and_absolute_paths_share_a_lock() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("data");
        fs::create_dir(&nested).unwrap();
        let path = nested.join("tasks.csv");
        let dotted = dir.path().join("data").join(".").join("tasks.csv");

        let store = TransactionalFileStore::new();
        let _tx = store.begin_transaction([&path]).unwrap();
        assert!(store.begin_transaction([&dotted]).unwrap_err().is_lock_conflict());
    }

    #[test]
    fn recover_restores_orphaned_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"half written").unwrap();
        fs::write(backup_path(&path), b"consistent").unwrap();

        let store = TransactionalFileStore::new();
        let restored = store.recover([&path]).unwrap();

        assert_eq!(restored, vec![normalize_path(&path)]);
        assert_eq!(fs::read(&path).unwrap(), b"consistent");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn recover_removes_file_created_by_crashed_transaction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"partial").unwrap();
        fs::write(absent_marker_path(&path), b"").unwrap();

        let store = TransactionalFileStore::new();
        store.recover([&path]).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn recover_skips_active_transactions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"data").unwrap();

        let store = TransactionalFileStore::new();
        let tx = store.begin_transaction([&path]).unwrap();

        assert!(store.recover([&path]).unwrap().is_empty());
        assert!(backup_path(&path).exists());

        store.commit_transaction(tx).unwrap();
    }

    #[test]
    fn begin_recovers_orphan_before_backing_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"torn").unwrap();
        fs::write(backup_path(&path), b"good").unwrap();

        let store = TransactionalFileStore::new();
        let tx = store.begin_transaction([&path]).unwrap();
        assert_eq!(tx.read(&path).unwrap(), Some(b"good".to_vec()));
        store.rollback_transaction(tx).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"good");
    }

    #[test]
    fn with_transaction_commits_on_ok() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");

        let store = TransactionalFileStore::new();
        let result: Result<(), StoreError> =
            store.with_transaction([&path], |tx| tx.write(&path, b"ok"));

        assert!(result.is_ok());
        assert_eq!(fs::read(&path).unwrap(), b"ok");
    }

    #[test]
    fn with_transaction_rolls_back_on_err() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"before").unwrap();

        let store = TransactionalFileStore::new();
        let result: Result<(), StoreError> = store.with_transaction([&path], |tx| {
            tx.write(&path, b"after")?;
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "validation failed",
            )))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"before");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn backup_failure_unwinds() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("a.csv");
        fs::write(&good, b"a").unwrap();
        // A directory cannot be copied, so its backup fails
        let bad = dir.path().join("b.csv");
        fs::create_dir(&bad).unwrap();

        let store = TransactionalFileStore::new();
        let err = store.begin_transaction([&good, &bad]).unwrap_err();

        assert!(matches!(err, StoreError::BackupIo { .. }));
        assert!(!backup_path(&good).exists());
        assert!(!backup_path(&bad).exists());
        assert!(!dir.path().join("b.csv.bak.tmp").exists());
        assert!(!store.lock_registry().is_locked(&normalize_path(&good)));
        assert!(!store.lock_registry().is_locked(&normalize_path(&bad)));
    }

    #[test]
    fn partial_backup_copy_is_never_restored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        fs::write(&path, b"intact").unwrap();
        // A crash mid-copy leaves a truncated copy behind
        let partial = dir.path().join("tasks.csv.bak.tmp");
        fs::write(&partial, b"int").unwrap();

        let store = TransactionalFileStore::new();
        assert!(store.recover([&path]).unwrap().is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"intact");
        assert!(!partial.exists());

        fs::write(&partial, b"int").unwrap();
        let tx = store.begin_transaction([&path]).unwrap();
        assert_eq!(fs::read(backup_path(&path)).unwrap(), b"intact");
        tx.rollback().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"intact");
        assert!(!partial.exists());
    }

    #[test]
    fn retired_backup_does_not_undo_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        let created = dir.path().join("projects.csv");
        fs::write(&path, b"before").unwrap();

        let store = TransactionalFileStore::new();
        let mut tx = store.begin_transaction([&path, &created]).unwrap();
        tx.write(&path, b"after").unwrap();
        tx.write(&created, b"new").unwrap();
        tx.commit().unwrap();

        // Backups renamed by the commit but never deleted
        let retired = dir.path().join("tasks.csv.bak.committed");
        let retired_marker = dir.path().join("projects.csv.bak.absent.committed");
        fs::write(&retired, b"before").unwrap();
        fs::write(&retired_marker, b"").unwrap();

        assert!(store.recover([&path, &created]).unwrap().is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"after");
        assert_eq!(fs::read(&created).unwrap(), b"new");
        assert!(!retired.exists());
        assert!(!retired_marker.exists());

        fs::write(&retired, b"before").unwrap();
        let tx = store.begin_transaction([&path]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"after");
        tx.commit().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"after");
        assert!(!retired.exists());
        assert!(!backup_path(&path).exists());
    }
}
