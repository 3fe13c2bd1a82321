//! Dispatch record — the last fingerprint a script variant was invoked for.
//!
//! Persists a [`DispatchRecord`] JSON document at `<state_dir>/dispatch.json`.
//! Writes use the atomic `.tmp` + rename pattern. The record is created on the
//! first successful dispatch, overwritten on each later one, and never
//! deleted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::fingerprint::Fingerprint;
use crate::writer::atomic_write;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchRecord {
    pub fingerprint: Fingerprint,
    /// Source name of the script variant that ran.
    pub variant: String,
    pub dispatched_at: DateTime<Utc>,
}

/// `<state_dir>/dispatch.json`
pub fn record_path_at(state_dir: &Path) -> PathBuf {
    state_dir.join("dispatch.json")
}

/// Load the record. `None` before the first successful dispatch.
pub fn load_at(state_dir: &Path) -> Result<Option<DispatchRecord>, SyncError> {
    let path = record_path_at(state_dir);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save the record atomically.
pub fn save_at(state_dir: &Path, record: &DispatchRecord) -> Result<(), SyncError> {
    let path = record_path_at(state_dir);
    let json = serde_json::to_string_pretty(record)?;
    atomic_write(&path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(fp: &str) -> DispatchRecord {
        DispatchRecord {
            fingerprint: Fingerprint::from_hex(fp),
            variant: "run_dot_config/apply.sh.tmpl".into(),
            dispatched_at: Utc::now(),
        }
    }

    #[test]
    fn no_record_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_at(tmp.path()).unwrap(), None);
    }

    #[test]
    fn save_overwrites_previous_record() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &record("aaaa")).unwrap();
        let second = record("bbbb");
        save_at(tmp.path(), &second).unwrap();
        assert_eq!(load_at(tmp.path()).unwrap(), Some(second));
        let tmp_path = PathBuf::from(format!("{}.swatch.tmp", record_path_at(tmp.path()).display()));
        assert!(!tmp_path.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn corrupt_record_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(record_path_at(tmp.path()), "{not json").unwrap();
        assert!(matches!(load_at(tmp.path()), Err(SyncError::Json(_))));
    }
}
