//! Swatch — keep themed dotfiles and theme scripts in step with one data file.
//!
//! # Usage
//!
//! ```text
//! swatch sync [--dry-run] [--os <os>] [--timeout <secs>] [--json]
//! swatch status [--os <os>] [--json]
//! swatch diff [--os <os>]
//! swatch render <template> [--os <os>]
//! swatch watch
//! ```
//!
//! Directories come from `SWATCH_HOME`, `SWATCH_CONFIG_DIR`,
//! `SWATCH_SOURCE_DIR`, `SWATCH_DEST_DIR` and `SWATCH_STATE_DIR`, falling back
//! to the platform defaults.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, render::RenderArgs, status::StatusArgs, sync::SyncArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "swatch",
    version,
    about = "Render dotfile templates and run theme scripts when settings change",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render config files and run the theme script if watched settings changed.
    Sync(SyncArgs),

    /// Show the current fingerprint and whether a script run is pending.
    Status(StatusArgs),

    /// Show unified diffs of what sync would write.
    Diff(DiffArgs),

    /// Render one template to stdout.
    Render(RenderArgs),

    /// Watch the data file and source tree and sync on every change.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Watch mode installs its own `info` subscriber.
    if !matches!(cli.command, Commands::Watch(_)) {
        swatch_daemon::init_tracing_with_default("warn");
    }
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Render(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}
