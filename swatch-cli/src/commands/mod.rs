//! Subcommand implementations and the setup they share.

pub mod diff;
pub mod render;
pub mod status;
pub mod sync;
pub mod watch;

use anyhow::{Context, Result};

use swatch_core::{Locations, OsName};
use swatch_sync::SyncCycle;

/// Directories for this invocation, from `SWATCH_*` or platform defaults.
pub fn locations() -> Result<Locations> {
    Locations::from_env().context("could not resolve swatch directories")
}

/// `--os` override, or the OS swatch is running on.
pub fn target_os(os: Option<String>) -> OsName {
    os.map(OsName::new).unwrap_or_else(OsName::current)
}

/// Load templates, scripts and the source manifest for `os`.
pub fn load_cycle(os: Option<String>) -> Result<SyncCycle> {
    let locations = locations()?;
    let source = locations.source_dir.clone();
    let cycle = SyncCycle::new(locations, target_os(os))
        .with_context(|| format!("failed to load templates from {}", source.display()))?;
    tracing::debug!(
        source = %source.display(),
        os = %cycle.os(),
        templates = cycle.engine().specs().count(),
        "loaded sync cycle"
    );
    Ok(cycle)
}
