//! Lock contention stress helpers.
//!
//! Many threads race for transactions over the same paths. Exactly one may
//! hold them at a time; losers see a lock conflict and try again.

use edusync_storage::{StoreError, TransactionalFileStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a contention run.
#[derive(Debug, Clone)]
pub struct ContentionResult {
    /// Transactions that acquired every path and committed.
    pub acquired: usize,
    /// Attempts rejected with a lock conflict.
    pub conflicts: usize,
    /// Attempts that failed for any other reason.
    pub errors: usize,
    /// Times two transactions held the paths at once.
    pub violations: usize,
    /// Total duration.
    pub duration: Duration,
}

impl ContentionResult {
    /// Returns true if no two transactions ever overlapped and nothing
    /// failed unexpectedly.
    pub fn is_exclusive(&self) -> bool {
        self.violations == 0 && self.errors == 0
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Acquired: {}", self.acquired);
        println!("Conflicts: {}", self.conflicts);
        println!("Errors: {}", self.errors);
        println!("Violations: {}", self.violations);
        println!("Duration: {:?}", self.duration);
    }
}

/// Runs `threads` workers that each attempt `iterations` transactions over
/// `paths`, writing a marker into every path while holding it.
pub fn contend_for_paths(
    store: &TransactionalFileStore,
    paths: &[PathBuf],
    threads: usize,
    iterations: usize,
) -> ContentionResult {
    let holders = Arc::new(AtomicUsize::new(0));
    let acquired = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let start_line = Arc::new(Barrier::new(threads));
    let paths: Arc<Vec<PathBuf>> = Arc::new(paths.to_vec());

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let store = store.clone();
            let paths = Arc::clone(&paths);
            let holders = Arc::clone(&holders);
            let acquired = Arc::clone(&acquired);
            let conflicts = Arc::clone(&conflicts);
            let errors = Arc::clone(&errors);
            let violations = Arc::clone(&violations);
            let start_line = Arc::clone(&start_line);

            thread::spawn(move || {
                start_line.wait();
                for i in 0..iterations {
                    let mut tx = match store.begin_transaction(paths.iter()) {
                        Ok(tx) => tx,
                        Err(StoreError::LockConflict { .. }) => {
                            conflicts.fetch_add(1, Ordering::SeqCst);
                            thread::yield_now();
                            continue;
                        }
                        Err(_) => {
                            errors.fetch_add(1, Ordering::SeqCst);
                            continue;
                        }
                    };

                    if holders.fetch_add(1, Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    let marker = format!("{worker}:{i}\n");
                    let written = paths
                        .iter()
                        .try_for_each(|p| tx.write(p, marker.as_bytes()));
                    holders.fetch_sub(1, Ordering::SeqCst);

                    let finished = match written {
                        Ok(()) => store.commit_transaction(tx),
                        Err(e) => store.rollback_transaction(tx).and(Err(e)),
                    };
                    match finished {
                        Ok(()) => acquired.fetch_add(1, Ordering::SeqCst),
                        Err(_) => errors.fetch_add(1, Ordering::SeqCst),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Contention worker panicked");
    }

    ContentionResult {
        acquired: acquired.load(Ordering::SeqCst),
        conflicts: conflicts.load(Ordering::SeqCst),
        errors: errors.load(Ordering::SeqCst),
        violations: violations.load(Ordering::SeqCst),
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn only_one_holder_at_a_time() {
        let dir = tempdir().unwrap();
        let paths = vec![dir.path().join("tasks.csv"), dir.path().join("projects.csv")];
        let store = TransactionalFileStore::new();

        let result = contend_for_paths(&store, &paths, 4, 50);

        assert!(result.is_exclusive(), "{result:?}");
        assert_eq!(result.acquired + result.conflicts, 200);
        assert!(result.acquired > 0);
        assert!(!store.lock_registry().is_locked(&paths[0]));
        for path in &paths {
            assert!(path.exists());
        }
    }
}
