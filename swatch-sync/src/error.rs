//! Error types for swatch-sync.

use std::path::PathBuf;

use thiserror::Error;

use swatch_core::StoreError;
use swatch_renderer::RenderError;

/// Errors fatal to a sync cycle. Per-template render failures and script
/// failures are not errors; they are reported in the cycle report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Loading the data file or the source manifest failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Loading the template source tree failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The script variant set is inconsistent (detected at load time).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Another cycle held the lock for longer than the wait period.
    #[error("another sync cycle holds the lock at {path}")]
    LockHeld { path: PathBuf },

    /// The cycle was cancelled before it could dispatch.
    #[error("sync cycle cancelled")]
    Cancelled,

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dispatch record (de)serialization error.
    #[error("dispatch record JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
