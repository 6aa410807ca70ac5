//! # EduSync Storage
//!
//! Transactional access to local flat files.
//!
//! This crate is the lowest layer of the EduSync sync core. Files are
//! **opaque byte stores** here: the store never interprets record formats,
//! it only guarantees that a set of files is changed all-or-nothing.
//!
//! ## Guarantees
//!
//! - At most one active [`Transaction`] holds the lock for a given path
//! - Lock acquisition is a single non-blocking attempt per path; the first
//!   conflict aborts the whole transaction with [`StoreError::LockConflict`]
//! - Every path is backed up to a `.bak` sibling before the transaction is
//!   handed out
//! - After rollback a path is byte-identical to its pre-transaction content
//! - After commit no backup artifact remains on disk
//! - Dropping an unfinished transaction rolls it back and releases its locks
//!
//! ## Example
//!
//! ```rust
//! use edusync_storage::TransactionalFileStore;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("tasks.csv");
//! std::fs::write(&path, b"id,title\n").unwrap();
//!
//! let store = TransactionalFileStore::new();
//! let mut tx = store.begin_transaction([&path]).unwrap();
//! tx.write(&path, b"id,title\n1,Grade essays\n").unwrap();
//! store.rollback_transaction(tx).unwrap();
//!
//! assert_eq!(std::fs::read(&path).unwrap(), b"id,title\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod artifact;
mod error;
mod lock;
mod store;
mod transaction;

pub use artifact::{absent_marker_path, backup_path, BACKUP_SUFFIX};
pub use error::{StoreError, StoreResult};
pub use lock::{LockRegistry, PathLock};
pub use store::TransactionalFileStore;
pub use transaction::{Transaction, TransactionId};
