//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Gitfolio has two configuration scopes:
//! - **Global**: Process tuning (timeouts, helper idle time, log size)
//! - **Repo**: Content repository settings (remote, refresh, languages)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$FOLIO_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/folio/config.toml`
//! 3. `~/.folio/config.toml`
//!
//! # Repo Config Location
//!
//! `.git/folio/config.toml` inside the content repository. Plain
//! directories (no `.git`) only use the global config.
//!
//! # Example
//!
//! ```no_run
//! use gitfolio::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/srv/site"))).unwrap().config;
//! println!("Remote: {}", config.remote());
//! println!("HEAD refresh: {:?}", config.head_refresh());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::git::StoreSettings;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// This struct provides accessor methods that apply precedence rules
/// automatically. Repo config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo)
    pub repo: Option<RepoConfig>,
}

impl Config {
    /// Build a configuration from in-memory scopes (no files involved).
    pub fn from_parts(global: GlobalConfig, repo: Option<RepoConfig>) -> Self {
        Self { global, repo }
    }

    /// Load configuration from default locations.
    ///
    /// If `repo_path` is provided, also loads repo-specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(repo_path: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        // Load global config
        let global = Self::load_global()?;

        // Load repo config if path provided
        let repo = match repo_path {
            Some(path) => Self::load_repo(path, &mut warnings)?,
            None => None,
        };

        // Validate loaded configs
        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config { global, repo },
            warnings,
        })
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<GlobalConfig, ConfigError> {
        // 1. Check $FOLIO_CONFIG
        if let Ok(path) = std::env::var("FOLIO_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::read_toml(&path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/folio/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("folio/config.toml");
            if path.exists() {
                return Self::read_toml(&path);
            }
        }

        // 3. Check ~/.folio/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".folio/config.toml");
            if path.exists() {
                return Self::read_toml(&path);
            }
        }

        // No config found, use defaults
        Ok(GlobalConfig::default())
    }

    /// Load repository configuration.
    ///
    /// Falls back to `.folio/config.toml` at the repository root (with a
    /// warning) for checkouts where `.git` is a file (linked worktrees).
    fn load_repo(
        repo_path: &Path,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<Option<RepoConfig>, ConfigError> {
        let canonical = Self::repo_config_path(repo_path);
        if canonical.exists() {
            return Self::read_toml(&canonical).map(Some);
        }

        let compat_root = repo_path.join(".folio/config.toml");
        if compat_root.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Config inside the working tree is served with the site. Please move it to '{}'",
                    canonical.display()
                ),
                path: compat_root.clone(),
            });
            return Self::read_toml(&compat_root).map(Some);
        }

        Ok(None)
    }

    /// Read and parse one toml config file.
    fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for repo config.
    ///
    /// Returns `.git/folio/config.toml` relative to the given repo path.
    pub fn repo_config_path(repo_path: &Path) -> PathBuf {
        repo_path.join(".git/folio/config.toml")
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Get the remote name.
    ///
    /// Defaults to "origin" if not configured.
    pub fn remote(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Whether `root` should be served as a plain directory.
    ///
    /// Uses the configured value, else plain when `root/.git` is absent.
    pub fn plain_directory(&self, root: &Path) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.plain_directory)
            .unwrap_or_else(|| !root.join(".git").exists())
    }

    /// Maximum age of the cached HEAD revision.
    ///
    /// Defaults to 120 seconds.
    pub fn head_refresh(&self) -> Duration {
        let secs = self
            .repo
            .as_ref()
            .and_then(|r| r.head_refresh_secs)
            .unwrap_or(120);
        Duration::from_secs(secs)
    }

    /// Whether a HEAD refresh pulls first.
    ///
    /// Defaults to `true`.
    pub fn pull_on_refresh(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.pull_on_refresh)
            .unwrap_or(true)
    }

    /// Language of pages without a `config.json`.
    ///
    /// Defaults to "en".
    pub fn default_lang(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.default_lang.as_deref())
            .unwrap_or("en")
    }

    /// Timeout for each git subprocess call.
    ///
    /// Defaults to 60 seconds.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.global.command_timeout_secs.unwrap_or(60))
    }

    /// Idle time before the batch helper is shut down.
    ///
    /// Defaults to 15 seconds.
    pub fn batch_idle(&self) -> Duration {
        Duration::from_secs(self.global.batch_idle_secs.unwrap_or(15))
    }

    /// Maximum number of entries a log query returns.
    ///
    /// Defaults to 50.
    pub fn log_max_entries(&self) -> usize {
        self.global.log_max_entries.unwrap_or(50)
    }

    /// Build the settings the object store runs with.
    pub fn store_settings(&self, root: &Path) -> StoreSettings {
        StoreSettings {
            root: root.to_path_buf(),
            plain_directory: self.plain_directory(root),
            remote: self.remote().to_string(),
            head_refresh: self.head_refresh(),
            pull_on_refresh: self.pull_on_refresh(),
            command_timeout: self.command_timeout(),
            batch_idle: self.batch_idle(),
            log_max_entries: self.log_max_entries(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_empty_defaults() {
        // Ensure no env vars interfere with this test
        std::env::remove_var("FOLIO_CONFIG");
        std::env::remove_var("XDG_CONFIG_HOME");

        let result = Config::load(None).unwrap();
        let config = result.config;

        assert_eq!(config.remote(), "origin");
        assert_eq!(config.default_lang(), "en");
        assert!(config.pull_on_refresh());
        assert_eq!(config.head_refresh(), Duration::from_secs(120));
    }

    #[test]
    fn load_global_from_env() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
            command_timeout_secs = 5
            batch_idle_secs = 2
            "#,
        )
        .unwrap();

        std::env::set_var("FOLIO_CONFIG", config_path.to_str().unwrap());

        let result = Config::load(None).unwrap();
        let config = result.config;

        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.batch_idle(), Duration::from_secs(2));

        std::env::remove_var("FOLIO_CONFIG");
    }

    #[test]
    fn load_repo_config() {
        let temp = TempDir::new().unwrap();
        let folio_dir = temp.path().join(".git/folio");
        fs::create_dir_all(&folio_dir).unwrap();

        fs::write(
            folio_dir.join("config.toml"),
            r#"
            remote = "upstream"
            head_refresh_secs = 10
            default_lang = "de"
            "#,
        )
        .unwrap();

        let result = Config::load(Some(temp.path())).unwrap();
        let config = result.config;

        assert_eq!(config.remote(), "upstream");
        assert_eq!(config.head_refresh(), Duration::from_secs(10));
        assert_eq!(config.default_lang(), "de");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn load_repo_from_worktree_warns() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".folio")).unwrap();
        fs::write(temp.path().join(".folio/config.toml"), "remote = \"mirror\"").unwrap();

        let result = Config::load(Some(temp.path())).unwrap();

        assert_eq!(result.config.remote(), "mirror");
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("served with the site"));
    }

    #[test]
    fn from_parts_applies_repo_over_defaults() {
        let config = Config::from_parts(
            GlobalConfig::default(),
            Some(RepoConfig {
                default_lang: Some("fr".into()),
                ..Default::default()
            }),
        );
        assert_eq!(config.default_lang(), "fr");
        assert_eq!(config.remote(), "origin");
        assert_eq!(config.log_max_entries(), 50);
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let folio_dir = temp.path().join(".git/folio");
        fs::create_dir_all(&folio_dir).unwrap();

        fs::write(
            folio_dir.join("config.toml"),
            r#"
            remote = "origin"
            unknown_field = true
            "#,
        )
        .unwrap();

        let result = Config::load(Some(temp.path()));
        assert!(result.is_err());
    }

    #[test]
    fn plain_directory_auto_detected() {
        let temp = TempDir::new().unwrap();
        let config = Config::default();
        assert!(config.plain_directory(temp.path()));

        fs::create_dir_all(temp.path().join(".git")).unwrap();
        assert!(!config.plain_directory(temp.path()));
    }

    #[test]
    fn explicit_plain_directory_wins() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let config = Config {
            repo: Some(RepoConfig {
                plain_directory: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.plain_directory(temp.path()));
    }

    #[test]
    fn store_settings_carry_config() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            global: GlobalConfig {
                log_max_entries: Some(7),
                ..Default::default()
            },
            repo: Some(RepoConfig {
                remote: Some("upstream".into()),
                pull_on_refresh: Some(false),
                ..Default::default()
            }),
        };

        let settings = config.store_settings(temp.path());
        assert_eq!(settings.root, temp.path());
        assert_eq!(settings.remote, "upstream");
        assert!(!settings.pull_on_refresh);
        assert_eq!(settings.log_max_entries, 7);
        assert!(settings.plain_directory);
    }
}
