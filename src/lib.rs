// Core layer - configuration and errors
pub mod core;

// Definitions layer - loading, classifying and diffing
pub mod commands;

// Remote layer - applying plans and driving invocations
pub mod deploy;

pub use core::{Config, DeployError, RemoteError};

pub use commands::{
    CommandDefinition, CommandSource, DirectoryLoader, DuplicatePolicy, LoadOutcome,
    ReconciliationPlan, RemoteCommand, StaticSource,
};

pub use deploy::{
    delete_command, delete_command_by_name, deploy_commands, deploy_commands_with_report,
    CommandApi, DeleteOptions, DeployOptions, DeployPhase, DeployReport, Deployer,
    GatewayMembership, GuildMembership, LogOptions, RestClient, Scope,
};
