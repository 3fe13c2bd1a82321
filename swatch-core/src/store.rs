//! Read-only access to the settings data file.
//!
//! # Storage layout
//!
//! ```text
//! <config_dir>/
//!   .swatchdata.yaml     (flat mapping of scalar settings)
//! ```
//!
//! The file is owned by an external writer (a theme picker); swatch only
//! reads it. Every cycle loads it fresh.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::locations::Locations;
use crate::types::Settings;

/// File name of the settings document inside the config directory.
pub const DATA_FILE_NAME: &str = ".swatchdata.yaml";

/// `<config_dir>/.swatchdata.yaml` — pure, no I/O.
pub fn data_path_at(config_dir: &Path) -> PathBuf {
    config_dir.join(DATA_FILE_NAME)
}

/// Handle on the data file. Loading has no side effects.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `<config_dir>/.swatchdata.yaml`.
    pub fn at(locations: &Locations) -> Self {
        Self::new(data_path_at(&locations.config_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings document.
    ///
    /// Returns `StoreError::NotFound` if absent,
    /// `StoreError::Parse` (with path + line context) if malformed YAML or if
    /// any value is not a scalar.
    pub fn load(&self) -> Result<Settings, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path: self.path.clone() });
            }
            Err(err) => {
                return Err(StoreError::Io { path: self.path.clone(), source: err });
            }
        };
        if contents.trim().is_empty() {
            return Ok(Settings::new());
        }
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
