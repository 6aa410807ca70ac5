//! Transaction handle.

use crate::artifact::{write_atomic, Backup};
use crate::error::{StoreError, StoreResult};
use crate::lock::PathLock;
use crate::store::normalize_path;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Identifier of a transaction, unique within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// One locked and backed-up path.
#[derive(Debug)]
pub(crate) struct Resource {
    pub(crate) path: PathBuf,
    pub(crate) backup: Backup,
    pub(crate) lock: PathLock,
}

/// An active file transaction.
///
/// Created by [`TransactionalFileStore::begin_transaction`] and consumed by
/// exactly one of [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// A transaction dropped without either is rolled back.
///
/// The handle holds thread-bound lock guards and is neither `Send` nor
/// `Sync`: it belongs to the thread that began it.
///
/// [`TransactionalFileStore::begin_transaction`]: crate::TransactionalFileStore::begin_transaction
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    resources: Vec<Resource>,
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, resources: Vec<Resource>) -> Self {
        Self {
            id,
            resources,
            finished: false,
        }
    }

    /// Returns the transaction identifier.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the resource paths covered by this transaction.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.resources.iter().map(|r| r.path.as_path())
    }

    /// Returns true if `path` is covered by this transaction.
    pub fn contains(&self, path: &Path) -> bool {
        self.resource(path).is_some()
    }

    /// Returns the backup artifact for `path`, if covered.
    pub fn backup_path(&self, path: &Path) -> Option<&Path> {
        self.resource(path).map(|r| r.backup.artifact())
    }

    /// Returns the paths whose locks are held by this transaction.
    pub fn locked_paths(&self) -> impl Iterator<Item = &Path> {
        self.resources.iter().map(|r| r.lock.path())
    }

    /// Reads the current contents of a covered path.
    ///
    /// Returns `None` if the file does not exist.
    pub fn read(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        let resource = self.require(path)?;
        match fs::read(&resource.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the contents of a covered path atomically.
    pub fn write(&mut self, path: &Path, data: &[u8]) -> StoreResult<()> {
        let resource = self.require(path)?;
        write_atomic(&resource.path, data)?;
        debug!(tx = %self.id, path = %resource.path.display(), bytes = data.len(), "wrote resource");
        Ok(())
    }

    /// Retires backup artifacts and releases all locks.
    ///
    /// Each backup is renamed out of recovery's reach before it is deleted,
    /// so a deletion failure cannot roll back the commit later. Failures
    /// are logged; locks are released regardless.
    pub fn commit(mut self) -> StoreResult<()> {
        self.finished = true;
        let resources = std::mem::take(&mut self.resources);

        for resource in &resources {
            if let Err(e) = resource.backup.retire() {
                warn!(
                    tx = %self.id,
                    path = %resource.backup.artifact().display(),
                    error = %e,
                    "failed to delete backup artifact"
                );
            }
        }

        drop(resources);
        debug!(tx = %self.id, "committed");
        Ok(())
    }

    /// Restores every backup over its original and releases all locks.
    pub fn rollback(mut self) -> StoreResult<()> {
        self.restore_all()
    }

    fn restore_all(&mut self) -> StoreResult<()> {
        self.finished = true;
        let resources = std::mem::take(&mut self.resources);
        let mut first_error = None;

        for resource in resources.iter().rev() {
            if let Err(source) = resource.backup.restore(&resource.path) {
                error!(
                    tx = %self.id,
                    path = %resource.path.display(),
                    error = %source,
                    "failed to restore backup"
                );
                if first_error.is_none() {
                    first_error = Some(StoreError::Restore {
                        path: resource.path.clone(),
                        source,
                    });
                }
            }
        }

        drop(resources);
        debug!(tx = %self.id, "rolled back");
        first_error.map_or(Ok(()), Err)
    }

    fn resource(&self, path: &Path) -> Option<&Resource> {
        let path = normalize_path(path);
        self.resources.iter().find(|r| r.path == path)
    }

    fn require(&self, path: &Path) -> StoreResult<&Resource> {
        self.resource(path)
            .ok_or_else(|| StoreError::PathNotInTransaction {
                path: path.to_path_buf(),
            })
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(tx = %self.id, "transaction dropped without commit, rolling back");
        // Errors are already logged per resource
        let _ = self.restore_all();
    }
}
