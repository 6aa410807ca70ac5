//! Error types for transactional file operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while running file transactions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another transaction holds the lock for this path.
    ///
    /// Nothing has been written; the whole transaction may be retried.
    #[error("lock conflict on {}", path.display())]
    LockConflict {
        /// The path whose lock could not be acquired.
        path: PathBuf,
    },

    /// Creating a backup artifact failed.
    ///
    /// All locks and partial backups of the transaction have been unwound.
    #[error("backup of {} failed: {source}", path.display())]
    BackupIo {
        /// The path being backed up.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Restoring a backup over its original failed.
    #[error("restore of {} failed: {source}", path.display())]
    Restore {
        /// The path being restored.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The path was not part of the transaction.
    #[error("path {} is not covered by the transaction", path.display())]
    PathNotInTransaction {
        /// The offending path.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Returns true if the failed operation left no trace and can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::LockConflict { .. } | StoreError::BackupIo { .. }
        )
    }

    /// Returns true if this is a lock conflict.
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, StoreError::LockConflict { .. })
    }
}
