//! enrolgroup: group and group-membership reconciliation.
//!
//! # Usage
//!
//! ```text
//! enrolgroup init [--remote <db>] [--local <db>] [--groups-table <t>]
//!                 [--members-table <t>] [--remove-orphans] [--disabled] [--force]
//! enrolgroup config [--json]
//! enrolgroup sync [--dry-run] [--json] [--course <idnumber>]...
//! ```
//!
//! Every command accepts `--config <path>` to use a config file other than
//! `~/.enrolgroup/config.yaml`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, init::InitArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "enrolgroup",
    version,
    about = "Reconcile course groups and group membership from an external database",
    long_about = None,
)]
struct Cli {
    /// Config file to use instead of ~/.enrolgroup/config.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config file.
    Init(InitArgs),

    /// Show the effective configuration and which features it enables.
    Config(ConfigArgs),

    /// Reconcile groups and memberships against the remote tables.
    Sync(SyncArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = commands::config_path(cli.config)?;
    match cli.command {
        Commands::Init(args) => args.run(&config_path),
        Commands::Config(args) => args.run(&config_path),
        Commands::Sync(args) => args.run(&config_path),
    }
}

/// Logs go to stderr; stdout carries the progress trace and reports.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
