//! Directory layout for one swatch installation.
//!
//! Environment overrides are read exactly once, by [`Locations::from_env`].
//! Everything downstream takes a `&Locations`, so tests build one with
//! [`Locations::at`] rooted in a `TempDir` and never touch the process
//! environment.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const ENV_CONFIG_DIR: &str = "SWATCH_CONFIG_DIR";
pub const ENV_SOURCE_DIR: &str = "SWATCH_SOURCE_DIR";
pub const ENV_DEST_DIR: &str = "SWATCH_DEST_DIR";
pub const ENV_HOME: &str = "SWATCH_HOME";
pub const ENV_STATE_DIR: &str = "SWATCH_STATE_DIR";

/// Every directory a sync cycle reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    /// Directory holding `.swatchdata.yaml`.
    pub config_dir: PathBuf,
    /// Template source tree.
    pub source_dir: PathBuf,
    /// Root that rendered config files are written under.
    pub dest_dir: PathBuf,
    /// Home / profile root handed to scripts.
    pub home_dir: PathBuf,
    /// Dispatch record, cycle lock and rendered scripts.
    pub state_dir: PathBuf,
}

impl Locations {
    /// Default layout rooted at `home`:
    ///
    /// ```text
    /// <home>/.config/swatch/            config_dir
    /// <home>/.local/share/swatch/source source_dir
    /// <home>/                           dest_dir
    /// <home>/.local/state/swatch/       state_dir
    /// ```
    pub fn at(home: &Path) -> Self {
        Self {
            config_dir: home.join(".config").join("swatch"),
            source_dir: home.join(".local").join("share").join("swatch").join("source"),
            dest_dir: home.to_path_buf(),
            home_dir: home.to_path_buf(),
            state_dir: home.join(".local").join("state").join("swatch"),
        }
    }

    /// Resolve locations from `SWATCH_*` variables, falling back to platform
    /// directories from `dirs`.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// [`Locations::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let home = match var(ENV_HOME) {
            Some(home) => home,
            None => dirs::home_dir().ok_or(StoreError::HomeNotFound)?,
        };
        let config_base = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        let data_base = dirs::data_dir().unwrap_or_else(|| home.join(".local").join("share"));
        let state_base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| home.join(".local").join("state"));

        Ok(Self {
            config_dir: var(ENV_CONFIG_DIR).unwrap_or_else(|| config_base.join("swatch")),
            source_dir: var(ENV_SOURCE_DIR)
                .unwrap_or_else(|| data_base.join("swatch").join("source")),
            dest_dir: var(ENV_DEST_DIR).unwrap_or_else(|| home.clone()),
            state_dir: var(ENV_STATE_DIR).unwrap_or_else(|| state_base.join("swatch")),
            home_dir: home,
        })
    }
}
