//! `swatch status` — fingerprint and dispatch visibility, no side effects.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use swatch_sync::StatusReport;

use super::load_cycle;

/// Arguments for `swatch status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Report as if running on this OS.
    #[arg(long)]
    pub os: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let cycle = load_cycle(self.os)?;
        let report = cycle.status().context("failed to compute status")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_status(&report);
        Ok(())
    }
}

fn print_status(report: &StatusReport) {
    println!(
        "Swatch v{} | {} | watching {}",
        env!("CARGO_PKG_VERSION"),
        report.os,
        report.watched.join(", ")
    );
    println!("fingerprint   {}", report.fingerprint);

    match &report.record {
        Some(record) => println!(
            "last run      {} ({} at {})",
            record.fingerprint.short(),
            record.variant,
            record.dispatched_at.to_rfc3339()
        ),
        None => println!("last run      {}", "never".bright_black()),
    }

    match &report.variant {
        Some(variant) => println!("script        {} ({})", variant.file_name, variant.source),
        None => println!("script        {}", "none for this OS".bright_black()),
    }

    if report.pending {
        println!("{} watched settings changed; run 'swatch sync'", "■".yellow().bold());
    } else {
        println!("{} up to date", "■".green().bold());
    }
}
