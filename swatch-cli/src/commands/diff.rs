//! `swatch diff` — show unified diffs for what sync would write.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::load_cycle;

/// Arguments for `swatch diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Render as if running on this OS.
    #[arg(long)]
    pub os: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let cycle = load_cycle(self.os)?;
        let report = cycle.diff().context("diff failed")?;

        for failure in &report.render_failures {
            eprintln!("{} {}: {}", "✗".red(), failure.template, failure.message);
        }

        if report.diffs.is_empty() {
            println!("No differences.");
            return Ok(());
        }

        for diff in report.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
