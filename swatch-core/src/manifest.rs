//! Optional `.swatch.yaml` at the root of the source tree.
//!
//! ```yaml
//! watch: [current_theme, current_font]
//! trigger: dot_config/.theme-trigger.tmpl
//! script_timeout_secs: 60
//! lock_wait_secs: 10
//! ```
//!
//! Every field is optional; an absent file is the default manifest.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const MANIFEST_FILE_NAME: &str = ".swatch.yaml";

/// Key watched when the manifest names none.
pub const DEFAULT_WATCH_KEY: &str = "current_theme";
/// Trigger template used when present and the manifest names none.
pub const DEFAULT_TRIGGER_TEMPLATE: &str = "dot_config/.theme-trigger.tmpl";

const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LOCK_WAIT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceManifest {
    #[serde(default = "default_watch")]
    pub watch: Vec<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default = "default_script_timeout")]
    pub script_timeout_secs: u64,
    #[serde(default = "default_lock_wait")]
    pub lock_wait_secs: u64,
}

fn default_watch() -> Vec<String> {
    vec![DEFAULT_WATCH_KEY.to_owned()]
}

fn default_script_timeout() -> u64 {
    DEFAULT_SCRIPT_TIMEOUT_SECS
}

fn default_lock_wait() -> u64 {
    DEFAULT_LOCK_WAIT_SECS
}

impl Default for SourceManifest {
    fn default() -> Self {
        Self {
            watch: default_watch(),
            trigger: None,
            script_timeout_secs: DEFAULT_SCRIPT_TIMEOUT_SECS,
            lock_wait_secs: DEFAULT_LOCK_WAIT_SECS,
        }
    }
}

/// `<source_dir>/.swatch.yaml` — pure, no I/O.
pub fn manifest_path_at(source_dir: &Path) -> PathBuf {
    source_dir.join(MANIFEST_FILE_NAME)
}

impl SourceManifest {
    /// Load the manifest for `source_dir`, falling back to defaults when the
    /// file is absent or empty.
    pub fn load_at(source_dir: &Path) -> Result<Self, StoreError> {
        let path = manifest_path_at(source_dir);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(StoreError::Io { path, source: err }),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| StoreError::Manifest { path, source })
    }

    /// Watched keys, sorted and de-duplicated.
    pub fn watched_keys(&self) -> Vec<String> {
        let mut keys = self.watch.clone();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }
}
