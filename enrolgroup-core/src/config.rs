//! Sync configuration and the YAML config file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.enrolgroup/
//!   config.yaml   (mode 0600)
//! ```
//!
//! # API pattern
//!
//! As with every path-bound helper in this workspace:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! [`SyncConfiguration`] is the immutable value handed to a run. Every
//! string in it is trimmed on read; an empty table or column disables the
//! feature that needs it instead of raising an error.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

// ---------------------------------------------------------------------------
// Group removal policy
// ---------------------------------------------------------------------------

/// What to do with local groups that no longer exist remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoveGroupsAction {
    /// Delete them permanently. Anything stored against the group is lost.
    Remove,
    #[default]
    Keep,
}

impl fmt::Display for RemoveGroupsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoveGroupsAction::Remove => write!(f, "remove"),
            RemoveGroupsAction::Keep => write!(f, "keep"),
        }
    }
}

// ---------------------------------------------------------------------------
// Field mappings
// ---------------------------------------------------------------------------

/// Remote groups table and its column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsMapping {
    pub table: String,
    pub course_idnumber: String,
    pub group_idnumber: String,
    pub name: String,
}

impl Default for GroupsMapping {
    fn default() -> Self {
        Self {
            table: String::new(),
            course_idnumber: "courseidnumber".to_string(),
            group_idnumber: "groupidnumber".to_string(),
            name: "groupname".to_string(),
        }
    }
}

impl GroupsMapping {
    pub fn table(&self) -> &str {
        self.table.trim()
    }

    pub fn course_column(&self) -> &str {
        self.course_idnumber.trim()
    }

    pub fn group_column(&self) -> &str {
        self.group_idnumber.trim()
    }

    pub fn name_column(&self) -> &str {
        self.name.trim()
    }

    /// Table and all three columns are configured.
    pub fn is_complete(&self) -> bool {
        [
            self.table(),
            self.course_column(),
            self.group_column(),
            self.name_column(),
        ]
        .iter()
        .all(|v| !v.is_empty())
    }
}

/// Remote membership table and its column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembersMapping {
    pub table: String,
    pub course_idnumber: String,
    pub group_idnumber: String,
    pub user_idnumber: String,
}

impl Default for MembersMapping {
    fn default() -> Self {
        Self {
            table: String::new(),
            course_idnumber: "courseidnumber".to_string(),
            group_idnumber: "groupidnumber".to_string(),
            user_idnumber: "useridnumber".to_string(),
        }
    }
}

impl MembersMapping {
    pub fn table(&self) -> &str {
        self.table.trim()
    }

    pub fn course_column(&self) -> &str {
        self.course_idnumber.trim()
    }

    pub fn group_column(&self) -> &str {
        self.group_idnumber.trim()
    }

    pub fn user_column(&self) -> &str {
        self.user_idnumber.trim()
    }

    pub fn is_complete(&self) -> bool {
        [
            self.table(),
            self.course_column(),
            self.group_column(),
            self.user_column(),
        ]
        .iter()
        .all(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// SyncConfiguration
// ---------------------------------------------------------------------------

/// Everything a reconciliation run needs to know about the remote tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfiguration {
    /// Master switch. Off means no run touches either side, whatever the mappings say.
    pub enabled: bool,
    pub groups: GroupsMapping,
    pub members: MembersMapping,
    pub remove_groups_action: RemoveGroupsAction,
}

impl Default for SyncConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            groups: GroupsMapping::default(),
            members: MembersMapping::default(),
            remove_groups_action: RemoveGroupsAction::default(),
        }
    }
}

impl SyncConfiguration {
    /// Group sync needs the master switch on plus the groups table and all of its columns.
    pub fn group_sync_enabled(&self) -> bool {
        self.enabled && self.groups.is_complete()
    }

    /// Membership sync additionally needs the membership table and columns.
    pub fn membership_sync_enabled(&self) -> bool {
        self.group_sync_enabled() && self.members.is_complete()
    }

    pub fn removes_orphans(&self) -> bool {
        self.remove_groups_action == RemoveGroupsAction::Remove
    }
}

// ---------------------------------------------------------------------------
// AppConfig (on-disk file)
// ---------------------------------------------------------------------------

/// Location of a SQLite database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Contents of `~/.enrolgroup/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// The authoritative remote database.
    pub remote: DatabaseConfig,
    /// The local system of record.
    pub local: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfiguration,
}

impl AppConfig {
    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could use.
    ///
    /// Incomplete field mappings are not errors; they switch features off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("remote.path is required".into()));
        }
        if self.local.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("local.path is required".into()));
        }
        if self.remote.path == self.local.path {
            return Err(ConfigError::Invalid(
                "remote and local cannot be the same database".into(),
            ));
        }
        Ok(())
    }
}

/// `<home>/.enrolgroup/config.yaml` (pure, no I/O).
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".enrolgroup").join("config.yaml")
}

/// Load and validate the config file at an explicit path.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: AppConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.enrolgroup/config.yaml`.
pub fn load_at(home: &Path) -> Result<AppConfig, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<AppConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically write the config to an explicit path.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Atomically write `<home>/.enrolgroup/config.yaml`.
pub fn save_at(home: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    save_to(&config_path_at(home), config)
}

/// `save_at` convenience wrapper.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

/// Resolve the user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
