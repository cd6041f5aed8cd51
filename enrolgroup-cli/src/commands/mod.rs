pub mod config;
pub mod init;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use enrolgroup_core::{config as app_config, AppConfig};

/// The explicit `--config` path, or `~/.enrolgroup/config.yaml`.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            Ok(app_config::config_path_at(&home))
        }
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let config = app_config::load_from(path).with_context(|| {
        format!(
            "failed to load config at {}; run `enrolgroup init` first",
            path.display()
        )
    })?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}
