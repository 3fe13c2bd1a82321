//! Unified diffs between rendered configs and what is on disk, for
//! `swatch diff`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use similar::TextDiff;

use crate::error::SyncError;
use crate::writer::{normalize_line_endings, read_existing_or_empty};

/// A single rendered file diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Diff `rendered` against the file at `dest_root/relative`.
///
/// Returns `None` when the file already has the rendered content.
pub(crate) fn diff_file(
    dest_root: &Path,
    relative: &Path,
    rendered: &str,
) -> Result<Option<FileDiff>, SyncError> {
    let path = dest_root.join(relative);
    let rendered = normalize_line_endings(rendered);
    let existing = read_existing_or_empty(&path)?;
    if existing == rendered {
        return Ok(None);
    }

    let old_header = format!("a/{}", relative.display());
    let new_header = format!("b/{}", relative.display());
    let unified = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Ok(Some(FileDiff { path, unified_diff: unified }))
}
