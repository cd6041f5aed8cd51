//! `enrolgroup init`: write a starter config file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use enrolgroup_core::{
    config as app_config, AppConfig, DatabaseConfig, GroupsMapping, MembersMapping,
    RemoveGroupsAction, SyncConfiguration,
};

/// Arguments for `enrolgroup init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Remote SQLite database holding the external tables
    /// (default: remote.db next to the config file).
    #[arg(long, value_name = "PATH")]
    pub remote: Option<PathBuf>,

    /// Local SQLite database (default: local.db next to the config file).
    #[arg(long, value_name = "PATH")]
    pub local: Option<PathBuf>,

    /// Remote table listing groups. Leave unset to keep group sync disabled.
    #[arg(long, value_name = "TABLE")]
    pub groups_table: Option<String>,

    /// Remote table listing group members.
    #[arg(long, value_name = "TABLE")]
    pub members_table: Option<String>,

    /// Delete local groups that disappear remotely instead of keeping them.
    #[arg(long)]
    pub remove_orphans: bool,

    /// Write the config with the sync job switched off.
    #[arg(long)]
    pub disabled: bool,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        if config_path.exists() && !self.force {
            bail!(
                "config already exists at {}; pass --force to overwrite",
                config_path.display()
            );
        }

        let dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let config = AppConfig {
            remote: DatabaseConfig {
                path: self.remote.unwrap_or_else(|| dir.join("remote.db")),
            },
            local: DatabaseConfig {
                path: self.local.unwrap_or_else(|| dir.join("local.db")),
            },
            sync: SyncConfiguration {
                enabled: !self.disabled,
                groups: GroupsMapping {
                    table: self.groups_table.unwrap_or_default(),
                    ..GroupsMapping::default()
                },
                members: MembersMapping {
                    table: self.members_table.unwrap_or_default(),
                    ..MembersMapping::default()
                },
                remove_groups_action: if self.remove_orphans {
                    RemoveGroupsAction::Remove
                } else {
                    RemoveGroupsAction::Keep
                },
            },
        };
        config.validate().context("refusing to write an unusable config")?;

        app_config::save_to(config_path, &config)
            .with_context(|| format!("failed to write {}", config_path.display()))?;

        println!("✓ Wrote {}", config_path.display());
        println!("  remote: {}", config.remote.path.display());
        println!("  local:  {}", config.local.path.display());
        if !config.sync.enabled {
            println!("  Sync is switched off; set sync.enabled to true to run it.");
        } else if !config.sync.group_sync_enabled() {
            println!("  Group sync is disabled until sync.groups.table is set.");
        }
        Ok(())
    }
}
