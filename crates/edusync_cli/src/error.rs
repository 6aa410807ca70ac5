//! CLI error types.

use edusync_core::CoreError;
use edusync_storage::StoreError;
use edusync_sync_engine::{RemoteError, SyncError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the `edusync` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON for the expected shape.
    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        /// The configuration file.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration names an entity type this build does not know.
    #[error("unsupported entity type '{0}'")]
    UnsupportedEntity(String),

    /// Registry or record error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Local storage error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote database could not be opened.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Synchronization error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Output or runtime I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Report serialization failed.
    #[error("cannot encode report: {0}")]
    Encode(#[from] serde_json::Error),
}
