//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$FOLIO_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/folio/config.toml`
//! 3. `~/.folio/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `.git/folio/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing (timeouts must be non-zero,
//! names must be non-empty).

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (process tuning).
///
/// # Example
///
/// ```toml
/// command_timeout_secs = 60
/// batch_idle_secs = 15
/// log_max_entries = 50
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Upper bound for every git subprocess and batch helper request
    pub command_timeout_secs: Option<u64>,

    /// Idle time after which the batch helper is shut down
    pub batch_idle_secs: Option<u64>,

    /// Maximum number of history entries returned by a log query
    pub log_max_entries: Option<usize>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.batch_idle_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "batch_idle_secs must be greater than zero".to_string(),
            ));
        }
        if self.log_max_entries == Some(0) {
            return Err(ConfigError::InvalidValue(
                "log_max_entries must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "origin"
/// head_refresh_secs = 120
/// pull_on_refresh = true
/// default_lang = "en"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote to pull from and push to (default: "origin")
    pub remote: Option<String>,

    /// Serve the directory as-is, without commits (default: auto-detect)
    pub plain_directory: Option<bool>,

    /// Maximum age of the cached HEAD before a read refreshes it
    pub head_refresh_secs: Option<u64>,

    /// Whether a HEAD refresh pulls from the remote first
    pub pull_on_refresh: Option<bool>,

    /// Language assumed for pages without a `config.json`
    pub default_lang: Option<String>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote cannot be empty".to_string(),
                ));
            }
        }

        if let Some(lang) = &self.default_lang {
            if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid default_lang '{}'",
                    lang
                )));
            }
        }

        Ok(())
    }
}
