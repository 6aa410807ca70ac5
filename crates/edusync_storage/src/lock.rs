//! Per-path lock registry.

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry of one mutual-exclusion primitive per resource path.
///
/// Locks are created lazily on first use and never removed, so the
/// registry grows with the number of distinct paths ever touched. Only
/// the lock objects are retained; no file state is kept here.
///
/// The registry only coordinates callers that go through it. Code that
/// reads or writes the same files directly is not excluded.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to acquire the lock for `path` without blocking.
    ///
    /// Returns `None` if another holder currently owns the lock.
    pub fn try_acquire(&self, path: &Path) -> Option<PathLock> {
        let lock = self.lock_for(path);
        lock.try_lock_arc().map(|guard| PathLock {
            path: path.to_path_buf(),
            _guard: guard,
        })
    }

    /// Returns true if the lock for `path` is currently held.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.locks
            .lock()
            .get(path)
            .is_some_and(|lock| lock.is_locked())
    }

    /// Returns the number of paths that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no path has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }
}

/// An acquired path lock. Released on drop.
///
/// The guard is tied to the thread that acquired it, so a lock (and the
/// transaction owning it) cannot be moved to another thread.
pub struct PathLock {
    path: PathBuf,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl PathLock {
    /// Returns the locked path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for PathLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLock").field("path", &self.path).finish()
    }
}
