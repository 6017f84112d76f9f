//! Caller-facing options for deploy and delete

use std::str::FromStr;
use std::time::Duration;

use super::rest::{DISCORD_API_BASE, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::commands::{DuplicatePolicy, DEFAULT_FILE_EXTENSION};
use crate::core::DeployError;

/// Default bound on waiting for guild membership, in seconds
pub const DEFAULT_GUILD_READY_TIMEOUT_SECS: u64 = 30;

/// Which deploy events produce `info` log lines
///
/// Failures are always logged regardless of these switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub status: bool,
    pub ignored: bool,
    pub created: bool,
    pub updated: bool,
    pub deleted: bool,
}

impl LogOptions {
    pub fn all() -> Self {
        Self {
            status: true,
            ignored: true,
            created: true,
            updated: true,
            deleted: true,
        }
    }

    pub fn none() -> Self {
        Self {
            status: false,
            ignored: false,
            created: false,
            updated: false,
            deleted: false,
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl From<bool> for LogOptions {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::all()
        } else {
            Self::none()
        }
    }
}

/// How global creations and updates are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GlobalStrategy {
    /// Create new commands one by one, then bulk-overwrite only if something changed
    #[default]
    Incremental,
    /// One bulk overwrite carrying the whole candidate set
    BulkReplace,
}

impl FromStr for GlobalStrategy {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "incremental" => Ok(Self::Incremental),
            "bulk_replace" | "bulk" => Ok(Self::BulkReplace),
            other => Err(DeployError::config(format!(
                "Unknown global strategy '{other}' (expected incremental or bulk_replace)"
            ))),
        }
    }
}

/// How far the guild phase goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GuildSync {
    /// Create or overwrite every targeted command, never delete
    #[default]
    CreateOnly,
    /// Also diff each targeted guild, deleting stale and skipping unchanged commands
    Reconcile,
}

impl FromStr for GuildSync {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "create_only" | "create" => Ok(Self::CreateOnly),
            "reconcile" => Ok(Self::Reconcile),
            other => Err(DeployError::config(format!(
                "Unknown guild sync mode '{other}' (expected create_only or reconcile)"
            ))),
        }
    }
}

/// Options for one deploy invocation
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub app_token: String,
    pub app_id: String,
    pub logs: LogOptions,
    /// Deploy global definitions into this guild instead of globally
    pub guild_id: Option<String>,
    pub file_extension: String,
    pub api_base: String,
    pub http_timeout: Duration,
    /// `None` waits for guild membership without a bound
    pub guild_ready_timeout: Option<Duration>,
    pub guild_concurrency: usize,
    pub global_strategy: GlobalStrategy,
    pub guild_sync: GuildSync,
    pub duplicate_policy: DuplicatePolicy,
    /// Re-read remote state right before the first global write
    pub verify_snapshot: bool,
    /// Only post guild commands to guilds the bot belongs to
    pub check_membership: bool,
}

impl DeployOptions {
    pub fn new(app_token: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            app_token: app_token.into(),
            app_id: app_id.into(),
            logs: LogOptions::default(),
            guild_id: None,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            api_base: DISCORD_API_BASE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            guild_ready_timeout: Some(Duration::from_secs(DEFAULT_GUILD_READY_TIMEOUT_SECS)),
            guild_concurrency: 1,
            global_strategy: GlobalStrategy::default(),
            guild_sync: GuildSync::default(),
            duplicate_policy: DuplicatePolicy::default(),
            verify_snapshot: true,
            check_membership: true,
        }
    }

    pub fn with_logs(mut self, logs: impl Into<LogOptions>) -> Self {
        self.logs = logs.into();
        self
    }

    pub fn with_guild_id(mut self, guild_id: Option<String>) -> Self {
        self.guild_id = guild_id;
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    /// Reject missing credentials and malformed ids before any network call
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.app_token.trim().is_empty() || self.app_id.trim().is_empty() {
            return Err(DeployError::validation("Missing 'app_token' or 'app_id'"));
        }
        if let Some(guild_id) = &self.guild_id {
            if !crate::commands::is_snowflake(guild_id) {
                return Err(DeployError::validation(format!(
                    "guild id '{guild_id}' is not a numeric string"
                )));
            }
        }
        if self.guild_concurrency == 0 {
            return Err(DeployError::validation("guild_concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Options for deleting one command
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub app_token: String,
    pub app_id: String,
    /// Delete from this guild instead of the global scope
    pub guild_id: Option<String>,
    pub api_base: String,
    pub http_timeout: Duration,
}

impl DeleteOptions {
    pub fn new(app_token: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            app_token: app_token.into(),
            app_id: app_id.into(),
            guild_id: None,
            api_base: DISCORD_API_BASE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_guild_id(mut self, guild_id: Option<String>) -> Self {
        self.guild_id = guild_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_options_from_bool() {
        assert_eq!(LogOptions::from(true), LogOptions::all());
        let off = LogOptions::from(false);
        assert!(!off.status && !off.ignored && !off.created && !off.updated && !off.deleted);
    }

    #[test]
    fn test_deploy_options_defaults() {
        let opts = DeployOptions::new("token", "42");
        assert_eq!(opts.file_extension, ".json");
        assert_eq!(opts.guild_concurrency, 1);
        assert_eq!(opts.global_strategy, GlobalStrategy::Incremental);
        assert_eq!(opts.guild_sync, GuildSync::CreateOnly);
        assert!(opts.verify_snapshot);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_deploy_options_validation() {
        assert!(DeployOptions::new("", "42").validate().is_err());
        assert!(DeployOptions::new("t", "42")
            .with_guild_id(Some("abc".to_string()))
            .validate()
            .is_err());

        let mut opts = DeployOptions::new("t", "42");
        opts.guild_concurrency = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("bulk-replace".parse::<GlobalStrategy>().unwrap(), GlobalStrategy::BulkReplace);
        assert_eq!("Reconcile".parse::<GuildSync>().unwrap(), GuildSync::Reconcile);
        assert!("later".parse::<GuildSync>().is_err());
    }
}
