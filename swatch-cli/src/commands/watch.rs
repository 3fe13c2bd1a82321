//! `swatch watch` — run the sync cycle on every data-file or source change.

use anyhow::{Context, Result};
use clap::Args;

use super::{locations, target_os};

/// Arguments for `swatch watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Dispatch scripts as if running on this OS.
    #[arg(long)]
    pub os: Option<String>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let locations = locations()?;
        swatch_daemon::start_blocking(locations, target_os(self.os)).context("watch mode failed")
    }
}
