//! Atomic writes into the destination root and the state directory.
//!
//! ## `write_rendered` protocol
//!
//! 1. Normalise line endings of the rendered content.
//! 2. Compare with the current on-disk content → skip if identical.
//! 3. Write to `<path>.swatch.tmp`.
//! 4. Rename to the final path (atomic on POSIX).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{io_err, SyncError};

/// Outcome of writing one rendered config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped; on-disk content already matches.
    Unchanged { path: PathBuf },
    /// Dry run: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }
}

pub(crate) fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}

/// Read `path`, treating a missing file as empty.
pub(crate) fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(normalize_line_endings(&content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Write `contents` to `path` through a sibling `.swatch.tmp` file, creating
/// parent directories as needed.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.swatch.tmp", path.display()));
    atomic_write_with_tmp(path, contents, &tmp)
}

fn atomic_write_with_tmp(path: &Path, contents: &[u8], tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, contents).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Write one rendered config, skipping identical content.
pub(crate) fn write_rendered(
    path: &Path,
    content: &str,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let normalized = normalize_line_endings(content);
    let unchanged = path.exists() && read_existing_or_empty(path)? == normalized;
    if unchanged {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged { path: path.to_path_buf() });
    }
    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite { path: path.to_path_buf() });
    }
    atomic_write(path, normalized.as_bytes())?;
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written { path: path.to_path_buf() })
}
