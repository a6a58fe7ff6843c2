//! TOML-based configuration for git-multimerge.
//!
//! Every section is optional. The remote access token is never stored in
//! the file: `repository.token_env` names an environment variable that is
//! resolved at runtime via [`MultiMergeConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::models::{BatchOptions, ConflictPolicy, MergeStrategy, DEFAULT_COMMIT_MESSAGE};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiMergeConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Defaults applied to batches started from the CLI.
    #[serde(default)]
    pub merge: MergeDefaults,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Working tree of the repository to merge in.
    #[serde(default = "default_repo_path")]
    pub path: PathBuf,

    /// Remote used for pulling, pushing and deleting remote branches.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Environment variable holding an HTTPS access token for the remote.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Resolved token (not serialized).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}
fn default_remote() -> String {
    "origin".into()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repo_path(),
            remote: default_remote(),
            token_env: None,
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeDefaults {
    #[serde(default)]
    pub strategy: MergeStrategy,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Commit message template; `{source}` and `{target}` are substituted.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    #[serde(default)]
    pub leave_checked_out: bool,

    #[serde(default)]
    pub push_after_merge: bool,

    #[serde(default)]
    pub delete_source_branch: bool,

    /// Pull each target from the remote before merging into it.
    #[serde(default)]
    pub sync_with_remote: bool,

    #[serde(default)]
    pub push_source_branch: bool,
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.into()
}

impl Default for MergeDefaults {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            conflict_policy: ConflictPolicy::default(),
            commit_message: default_commit_message(),
            leave_checked_out: false,
            push_after_merge: false,
            delete_source_branch: false,
            sync_with_remote: false,
            push_source_branch: false,
        }
    }
}

impl MergeDefaults {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            leave_checked_out: self.leave_checked_out,
            commit_message: Some(self.commit_message.clone()),
            push_after_merge: self.push_after_merge,
            delete_source_branch: self.delete_source_branch,
            sync_with_remote: self.sync_with_remote,
            push_source_branch: self.push_source_branch,
        }
    }
}

// ---------------------------------------------------------------------------
// State and logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory of the batch store. Relative paths are resolved against
    /// the repository path.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".git/multimerge")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl MultiMergeConfig {
    /// Load from a TOML file without resolving environment variables.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: MultiMergeConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `repository.token_env`. A missing variable only warns: the
    /// token is needed only when pushing over HTTPS.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.repository.token_env {
            self.repository.token = resolve_optional_env(env_name, "repository.token_env");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.path".into(),
                detail: "repository path must not be empty".into(),
            });
        }
        if self.repository.remote.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.remote".into(),
                detail: "remote name must not be empty".into(),
            });
        }
        if self.merge.commit_message.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "merge.commit_message".into(),
                detail: "commit message template must not be empty".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!(
                    "unknown level '{}', expected one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// The store directory, anchored at the repository when relative.
    pub fn data_dir(&self) -> PathBuf {
        if self.state.data_dir.is_absolute() {
            self.state.data_dir.clone()
        } else {
            self.repository.path.join(&self.state.data_dir)
        }
    }

    /// Render the configuration as TOML (used by `init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
