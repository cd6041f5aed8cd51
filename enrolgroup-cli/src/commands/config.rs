//! `enrolgroup config`: show the effective configuration.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use enrolgroup_core::{AppConfig, SyncConfiguration};

/// Arguments for `enrolgroup config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ConfigArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = super::load_config(config_path)?;
        if self.json {
            print_json(config_path, &config)
        } else {
            print_table(config_path, &config);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ConfigJson<'a> {
    path: String,
    remote: String,
    local: String,
    group_sync_enabled: bool,
    membership_sync_enabled: bool,
    sync: &'a SyncConfiguration,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "setting")]
    setting: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn print_json(config_path: &Path, config: &AppConfig) -> Result<()> {
    let payload = ConfigJson {
        path: config_path.display().to_string(),
        remote: config.remote.path.display().to_string(),
        local: config.local.path.display().to_string(),
        group_sync_enabled: config.sync.group_sync_enabled(),
        membership_sync_enabled: config.sync.membership_sync_enabled(),
        sync: &config.sync,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize config JSON")?
    );
    Ok(())
}

fn print_table(config_path: &Path, config: &AppConfig) {
    let sync = &config.sync;
    println!("Config: {}", config_path.display());
    println!(
        "Group sync: {}   Membership sync: {}",
        enabled(sync.group_sync_enabled()),
        enabled(sync.membership_sync_enabled())
    );

    let rows = vec![
        row("sync job", if sync.enabled { "on" } else { "off" }),
        row("remote database", config.remote.path.display().to_string()),
        row("local database", config.local.path.display().to_string()),
        row("groups table", sync.groups.table()),
        row("  course idnumber column", sync.groups.course_column()),
        row("  group idnumber column", sync.groups.group_column()),
        row("  group name column", sync.groups.name_column()),
        row("members table", sync.members.table()),
        row("  course idnumber column", sync.members.course_column()),
        row("  group idnumber column", sync.members.group_column()),
        row("  user idnumber column", sync.members.user_column()),
        row("orphaned groups", sync.remove_groups_action.to_string()),
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn row(setting: &'static str, value: impl Into<String>) -> SettingRow {
    let value = value.into();
    SettingRow {
        setting,
        value: if value.is_empty() {
            "(not set)".to_string()
        } else {
            value
        },
    }
}

fn enabled(on: bool) -> String {
    if on {
        "enabled".green().bold().to_string()
    } else {
        "disabled".yellow().bold().to_string()
    }
}
