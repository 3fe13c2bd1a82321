//! Change detection over the watched subset of settings.
//!
//! The fingerprint is the SHA-256 of a canonical JSON document mapping each
//! watched key (sorted) to `[kind, value]`, or to `null` when the key is
//! absent. Tagging every value with its kind keeps `14`, `"14"` and `14.0`
//! apart; `null` never collides with a present value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use swatch_core::Settings;

/// Deterministic digest of the watched configuration state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing hex digest (e.g. read back from the dispatch record).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical(settings: &Settings, watched: &[String]) -> String {
    let entries: BTreeMap<&str, Value> = watched
        .iter()
        .map(|key| {
            let entry = match settings.get(key) {
                Some(value) => json!([value.kind(), value.to_string()]),
                None => Value::Null,
            };
            (key.as_str(), entry)
        })
        .collect();
    // A BTreeMap of strings to JSON values always serializes.
    serde_json::to_string(&entries).unwrap_or_default()
}

/// Fingerprint the watched keys of `settings`. Keys outside `watched` have no
/// influence on the result.
pub fn compute(settings: &Settings, watched: &[String]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical(settings, watched).as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Fallback trigger content: one `key=value` line per watched key, sorted by
/// key. Absent keys render as `key=`.
pub fn default_trigger_content(settings: &Settings, watched: &[String]) -> String {
    let mut keys: Vec<&String> = watched.iter().collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .map(|key| {
            let value = settings.get(key).map(|v| v.to_string()).unwrap_or_default();
            format!("{key}={value}\n")
        })
        .collect()
}
