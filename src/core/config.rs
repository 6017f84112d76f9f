//! # Configuration
//!
//! Environment-backed settings for the `sync-commands` binary.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Strategy, guild sync and duplicate policy variables
//! - 1.0.0: Credentials, directory and log level

use std::path::PathBuf;
use std::time::Duration;

use super::error::DeployError;
use crate::commands::{DuplicatePolicy, DEFAULT_FILE_EXTENSION};
use crate::deploy::{
    DeleteOptions, DeployOptions, GlobalStrategy, GuildSync, LogOptions, DEFAULT_GUILD_READY_TIMEOUT_SECS,
    DEFAULT_HTTP_TIMEOUT_SECS, DISCORD_API_BASE,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub application_id: String,
    pub commands_dir: PathBuf,
    pub file_extension: String,
    pub guild_id: Option<String>,
    pub api_base: String,
    pub log_level: String,
    pub http_timeout_secs: u64,
    /// `0` waits for guild membership without a bound
    pub guild_ready_timeout_secs: u64,
    pub guild_concurrency: usize,
    pub global_strategy: GlobalStrategy,
    pub guild_sync: GuildSync,
    pub duplicate_policy: DuplicatePolicy,
    pub logs: LogOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, DeployError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .ok_or_else(|| DeployError::config("DISCORD_TOKEN must be set"))?;
        let application_id = get("DISCORD_APPLICATION_ID")
            .ok_or_else(|| DeployError::config("DISCORD_APPLICATION_ID must be set"))?;

        Ok(Self {
            discord_token,
            application_id,
            commands_dir: PathBuf::from(get("COMMANDS_DIR").unwrap_or_else(|| "commands".to_string())),
            file_extension: get("COMMAND_FILE_EXTENSION")
                .unwrap_or_else(|| DEFAULT_FILE_EXTENSION.to_string()),
            guild_id: get("DISCORD_GUILD_ID"),
            api_base: get("DISCORD_API_BASE").unwrap_or_else(|| DISCORD_API_BASE.to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            http_timeout_secs: parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            guild_ready_timeout_secs: parse_or(
                get("GUILD_READY_TIMEOUT_SECS"),
                "GUILD_READY_TIMEOUT_SECS",
                DEFAULT_GUILD_READY_TIMEOUT_SECS,
            )?,
            guild_concurrency: parse_or(get("GUILD_CONCURRENCY"), "GUILD_CONCURRENCY", 1)?,
            global_strategy: get("GLOBAL_STRATEGY")
                .map(|v| v.parse::<GlobalStrategy>())
                .transpose()?
                .unwrap_or_default(),
            guild_sync: get("GUILD_SYNC")
                .map(|v| v.parse::<GuildSync>())
                .transpose()?
                .unwrap_or_default(),
            duplicate_policy: get("DUPLICATE_POLICY")
                .map(|v| v.parse::<DuplicatePolicy>())
                .transpose()?
                .unwrap_or_default(),
            logs: get("DEPLOY_LOGS")
                .map(|v| parse_logs(&v))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn to_deploy_options(&self) -> DeployOptions {
        let mut options = DeployOptions::new(&self.discord_token, &self.application_id)
            .with_logs(self.logs)
            .with_guild_id(self.guild_id.clone())
            .with_file_extension(&self.file_extension);
        options.api_base = self.api_base.clone();
        options.http_timeout = Duration::from_secs(self.http_timeout_secs);
        options.guild_ready_timeout = match self.guild_ready_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        options.guild_concurrency = self.guild_concurrency;
        options.global_strategy = self.global_strategy;
        options.guild_sync = self.guild_sync;
        options.duplicate_policy = self.duplicate_policy;
        options
    }

    pub fn to_delete_options(&self) -> DeleteOptions {
        let mut options = DeleteOptions::new(&self.discord_token, &self.application_id)
            .with_guild_id(self.guild_id.clone());
        options.api_base = self.api_base.clone();
        options.http_timeout = Duration::from_secs(self.http_timeout_secs);
        options
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, DeployError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| DeployError::config(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}

/// `all`, `none`, a boolean, or a comma list such as `status,created`
fn parse_logs(raw: &str) -> Result<LogOptions, DeployError> {
    match raw.to_lowercase().as_str() {
        "all" | "true" | "1" => return Ok(LogOptions::all()),
        "none" | "false" | "0" => return Ok(LogOptions::none()),
        _ => {}
    }

    let mut logs = LogOptions::none();
    for item in raw.split(',').map(|s| s.trim().to_lowercase()) {
        match item.as_str() {
            "status" => logs.status = true,
            "ignored" => logs.ignored = true,
            "created" => logs.created = true,
            "updated" => logs.updated = true,
            "deleted" => logs.deleted = true,
            "" => {}
            other => {
                return Err(DeployError::config(format!("DEPLOY_LOGS has an unknown entry '{other}'")))
            }
        }
    }
    Ok(logs)
}
