//! Backup artifacts and atomic file replacement.
//!
//! Layout next to a resource `<path>`:
//!
//! ```text
//! <path>             # the resource itself
//! <path>.bak         # pre-transaction copy (resource existed)
//! <path>.bak.absent  # marker (resource did not exist)
//! <path>.tmp         # scratch file for write-then-rename
//! <path>.bak.tmp     # backup copy in progress
//! <path>.bak.committed, <path>.bak.absent.committed
//!                    # backup of a committed transaction awaiting deletion
//! ```
//!
//! Artifacts only exist while a transaction is active, or after a crash.
//! Only `.bak` and `.bak.absent` are ever restored. A `.bak` appears by
//! rename once its copy is complete, and a commit renames its artifact
//! away before deleting it, so the leftovers of a crash in either step are
//! ignored by recovery and swept by [`clear_stale`].

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of backup artifacts.
pub const BACKUP_SUFFIX: &str = ".bak";
const ABSENT_SUFFIX: &str = ".bak.absent";
const TEMP_SUFFIX: &str = ".tmp";
const COMMITTED_SUFFIX: &str = ".committed";

/// Returns the backup artifact path for a resource.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

/// Returns the marker path recording that a resource did not exist.
pub fn absent_marker_path(path: &Path) -> PathBuf {
    with_suffix(path, ABSENT_SUFFIX)
}

fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

fn retired_path(artifact: &Path) -> PathBuf {
    with_suffix(artifact, COMMITTED_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// The pre-transaction state of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Backup {
    /// The resource existed and was copied to the artifact.
    Copy(PathBuf),
    /// The resource did not exist; the artifact is an empty marker.
    Absent(PathBuf),
}

impl Backup {
    /// Snapshots `path` into its backup artifact.
    pub(crate) fn create(path: &Path) -> io::Result<Self> {
        if path.exists() {
            let artifact = backup_path(path);
            let partial = temp_path(&artifact);
            let result = (|| {
                fs::copy(path, &partial)?;
                File::open(&partial)?.sync_all()?;
                fs::rename(&partial, &artifact)?;
                sync_parent(path)
            })();

            if let Err(e) = result {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
            Ok(Backup::Copy(artifact))
        } else {
            let marker = absent_marker_path(path);
            File::create(&marker)?.sync_all()?;
            sync_parent(path)?;
            Ok(Backup::Absent(marker))
        }
    }

    /// Returns the artifact path on disk.
    pub(crate) fn artifact(&self) -> &Path {
        match self {
            Backup::Copy(artifact) | Backup::Absent(artifact) => artifact,
        }
    }

    /// Puts the pre-transaction state back in place and consumes the artifact.
    pub(crate) fn restore(&self, path: &Path) -> io::Result<()> {
        match self {
            Backup::Copy(artifact) => {
                // rename is atomic: the resource is either fully old or fully new
                fs::rename(artifact, path)?;
            }
            Backup::Absent(marker) => {
                remove_if_exists(path)?;
                remove_if_exists(marker)?;
            }
        }
        sync_parent(path)
    }

    /// Deletes the artifact.
    pub(crate) fn discard(&self) -> io::Result<()> {
        remove_if_exists(self.artifact())
    }

    /// Takes the artifact out of recovery's reach, then deletes it.
    ///
    /// The artifact is renamed to its `.committed` name first. If that
    /// rename fails it is deleted in place. An error after a successful
    /// rename leaves only a file recovery ignores.
    pub(crate) fn retire(&self) -> io::Result<()> {
        let artifact = self.artifact();
        let retired = retired_path(artifact);
        match fs::rename(artifact, &retired) {
            Ok(()) => {
                sync_parent(artifact)?;
                remove_if_exists(&retired)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(_) => remove_if_exists(artifact),
        }
    }

    /// Finds an artifact left behind for `path`, if any.
    pub(crate) fn find_orphan(path: &Path) -> Option<Self> {
        let artifact = backup_path(path);
        if artifact.exists() {
            return Some(Backup::Copy(artifact));
        }
        let marker = absent_marker_path(path);
        if marker.exists() {
            return Some(Backup::Absent(marker));
        }
        None
    }
}

/// Deletes artifacts of `path` that are never restored.
///
/// Returns how many were removed.
pub(crate) fn clear_stale(path: &Path) -> io::Result<usize> {
    let backup = backup_path(path);
    let stale = [
        temp_path(&backup),
        retired_path(&backup),
        retired_path(&absent_marker_path(path)),
    ];

    let mut removed = 0;
    for artifact in &stale {
        if artifact.exists() {
            remove_if_exists(artifact)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Replaces the contents of `path` atomically.
///
/// Writes to a temporary sibling, syncs it, then renames it over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let temp = temp_path(path);
    let result = (|| {
        let mut file = File::create(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, path)?;
        sync_parent(path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Syncs the directory containing `path` so renames and deletions are durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    // NTFS journals metadata; directory handles cannot be fsynced
    Ok(())
}
