//! # Deploy Module
//!
//! Applies reconciliation plans to Discord and drives whole deploy/delete
//! invocations.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Gateway-backed guild membership, guild reconcile mode
//! - 1.1.0: `CommandApi` seam, snapshot verification, cancellation
//! - 1.0.0: Initial REST applier and orchestrator

pub mod api;
pub mod applier;
pub mod guilds;
pub mod options;
pub mod orchestrator;
pub mod rest;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{CommandApi, Scope};
pub use applier::{ApplySettings, Applier, GuildFailure, GuildOutcome};
pub use guilds::{
    GatewayMembership, GatewayMembershipHandler, GuildMembership, RestMembership, StaticMembership,
};
pub use options::{
    DeleteOptions, DeployOptions, GlobalStrategy, GuildSync, LogOptions,
    DEFAULT_GUILD_READY_TIMEOUT_SECS,
};
pub use orchestrator::{
    delete_command, delete_command_by_name, delete_command_by_name_with, delete_command_with,
    deploy_commands, deploy_commands_with_report, DeployPhase, DeployReport, Deployer,
};
pub use rest::{RestClient, DEFAULT_HTTP_TIMEOUT_SECS, DISCORD_API_BASE};
