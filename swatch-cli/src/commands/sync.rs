//! `swatch sync` — render configs and dispatch the theme script once.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use swatch_sync::{CycleOptions, CycleReport, DispatchOutcome, SkipReason, WriteResult};

use super::load_cycle;

/// Arguments for `swatch sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Show what would be written and run without touching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Act as if running on this OS (`linux`, `windows`, `darwin`, ...).
    #[arg(long)]
    pub os: Option<String>,

    /// Script timeout in seconds; overrides `script_timeout_secs` in `.swatch.yaml`.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Emit the cycle report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let cycle = load_cycle(self.os)?;
        let options = CycleOptions {
            dry_run: self.dry_run,
            script_timeout: self.timeout.map(Duration::from_secs),
            ..CycleOptions::default()
        };
        let report = cycle.run(&options).context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize sync report")?
            );
        } else {
            print_report(&report, self.dry_run);
        }

        if let DispatchOutcome::Failed { reason, .. } = &report.dispatch {
            bail!("theme script failed: {reason}");
        }
        Ok(())
    }
}

fn print_report(report: &CycleReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let written = report
        .writes
        .iter()
        .filter(|r| matches!(r, WriteResult::Written { .. } | WriteResult::WouldWrite { .. }))
        .count();
    let unchanged = report.writes.len() - written;

    println!(
        "{prefix}✓ rendered {} templates ({written} written, {unchanged} unchanged)",
        report.templates_rendered
    );
    for r in &report.writes {
        match r {
            WriteResult::Written { path } => println!("  ✎  {}", path.display()),
            WriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
            WriteResult::Unchanged { path } => println!("  ·  {}", path.display()),
        }
    }
    for failure in &report.render_failures {
        println!("  {} {}: {}", "✗".red(), failure.template, failure.message);
    }

    println!("{prefix}fingerprint {}", report.fingerprint.short());
    println!("{prefix}{}", dispatch_line(&report.dispatch));
}

fn dispatch_line(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Invoked { variant } => {
            format!("{} ran {}", "▶".green().bold(), variant.file_name)
        }
        DispatchOutcome::Skipped { reason } => {
            let why = match reason {
                SkipReason::Unchanged => "watched settings unchanged",
                SkipReason::NoVariantForOs => "no theme script for this OS",
                SkipReason::DryRun => "dry run",
            };
            format!("{} script skipped ({why})", "·".bright_black())
        }
        DispatchOutcome::Failed { variant, reason } => {
            let name = variant.as_ref().map_or("theme script", |v| v.file_name.as_str());
            format!("{} {name} failed: {reason}", "✗".red().bold())
        }
    }
}
