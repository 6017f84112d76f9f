//! # Deploy Orchestrator
//!
//! Drives one invocation: load, classify, diff, apply. Never returns an
//! error past its boundary; everything is folded into a `DeployReport`.
//!
//! Concurrent invocations against the same application are unsafe. The
//! global overwrite is a read-modify-write on shared remote state, and the
//! snapshot check only narrows the window.
//!
//! - **Version**: 1.2.1
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.1: Development guild targets join the guild's candidate set; report lists only applied names
//! - 1.2.0: Delete by name, development guild mode
//! - 1.1.0: Phase tracking and cancellation
//! - 1.0.0: Initial deploy/delete surface

use log::{debug, error, info};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::api::{CommandApi, Scope};
use super::applier::{ApplySettings, Applier, GuildFailure, GuildOutcome};
use super::guilds::{GuildMembership, RestMembership};
use super::options::{DeleteOptions, DeployOptions, GlobalStrategy};
use super::rest::RestClient;
use crate::commands::{
    classify, is_snowflake, CommandDefinition, CommandSource, DirectoryLoader, GuildTarget,
    ReconciliationPlan,
};
use crate::core::DeployError;

/// Pipeline states, in the order one invocation passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Idle,
    Loading,
    Classifying,
    Diffing,
    Deleting,
    Creating,
    Updating,
    GuildApplying,
    Done,
    Failed,
}

impl DeployPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of one deploy invocation
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub phases: Vec<DeployPhase>,
    pub ignored: Vec<String>,
    pub load_errors: Vec<String>,
    /// Names written in the main scope; each list is filled once its step succeeds
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub guilds: GuildOutcome,
    /// The unrecoverable error, if the invocation failed
    pub error: Option<String>,
}

impl DeployReport {
    fn new() -> Self {
        Self {
            phases: vec![DeployPhase::Idle],
            ignored: Vec::new(),
            load_errors: Vec::new(),
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            guilds: GuildOutcome::default(),
            error: None,
        }
    }

    fn enter(&mut self, phase: DeployPhase) {
        debug!("Deploy phase: {} -> {phase}", self.phase());
        self.phases.push(phase);
    }

    fn fail(&mut self, err: &DeployError) {
        error!("❌ Error while refreshing commands: {err}");
        self.error = Some(err.to_string());
        self.enter(DeployPhase::Failed);
    }

    /// Current (or final) phase
    pub fn phase(&self) -> DeployPhase {
        self.phases.last().copied().unwrap_or(DeployPhase::Idle)
    }

    /// True only if no unrecoverable error occurred; guild failures don't count
    pub fn success(&self) -> bool {
        self.phase() == DeployPhase::Done
    }

    pub fn guild_failures(&self) -> &[GuildFailure] {
        &self.guilds.failures
    }

    /// True when the global scope needed no change
    pub fn global_unchanged(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Reconciles a command source with one application's registered commands
///
/// Do not run two deployers against the same application at once.
pub struct Deployer {
    api: Arc<dyn CommandApi>,
    options: DeployOptions,
    membership: Option<Arc<dyn GuildMembership>>,
    cancel: CancellationToken,
}

impl Deployer {
    pub fn new(api: Arc<dyn CommandApi>, options: DeployOptions) -> Self {
        Self {
            api,
            options,
            membership: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Only post guild commands into guilds this source reports
    pub fn with_membership(mut self, membership: Arc<dyn GuildMembership>) -> Self {
        self.membership = Some(membership);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the whole pipeline once
    pub async fn deploy(&self, source: &dyn CommandSource) -> DeployReport {
        let mut report = DeployReport::new();
        match self.run(source, &mut report).await {
            Ok(()) => report.enter(DeployPhase::Done),
            Err(err) => report.fail(&err),
        }
        report
    }

    fn checkpoint(&self) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            Err(DeployError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn run(&self, source: &dyn CommandSource, report: &mut DeployReport) -> Result<(), DeployError> {
        let opts = &self.options;
        let logs = opts.logs;
        opts.validate()?;

        report.enter(DeployPhase::Loading);
        let loaded = source.load().await?;
        report.load_errors = loaded.errors.iter().map(ToString::to_string).collect();

        report.enter(DeployPhase::Classifying);
        let classified = classify(loaded.definitions, opts.duplicate_policy)?;
        report.ignored = classified.ignored_names();
        if logs.ignored {
            for name in &report.ignored {
                info!("- Command '{name}' is ignored!");
            }
        }

        let (scope, candidates, guild_targets) = match &opts.guild_id {
            Some(guild_id) => {
                let (candidates, rest) =
                    merge_development_guild(guild_id, classified.global, classified.guild_scoped);
                (Scope::guild(guild_id.clone()), candidates, rest)
            }
            None => (Scope::Global, classified.global, classified.guild_scoped),
        };
        if logs.status {
            info!(
                "🔁 Started refreshing {} {scope} and {} guild commands from {}.",
                candidates.len(),
                guild_targets.len(),
                source.describe()
            );
        }

        report.enter(DeployPhase::Diffing);
        self.checkpoint()?;
        let remote = self.api.list_commands(&scope).await?;
        let plan = ReconciliationPlan::compute(&candidates, &remote);

        let applier = Applier::new(
            self.api.clone(),
            ApplySettings {
                logs,
                global_strategy: opts.global_strategy,
                guild_sync: opts.guild_sync,
                guild_concurrency: opts.guild_concurrency,
                guild_ready_timeout: opts.guild_ready_timeout,
            },
            self.cancel.clone(),
        );

        if !plan.is_empty() && opts.verify_snapshot {
            applier.verify_snapshot(&scope, &remote).await?;
        }

        report.enter(DeployPhase::Deleting);
        if logs.status {
            info!("🔁 Deleting {} {scope} commands...", plan.to_delete.len());
        }
        applier.delete_stale(&scope, &plan).await?;
        report.deleted = plan.deleted_names();

        report.enter(DeployPhase::Creating);
        if logs.status {
            info!("🔁 Creating {} {scope} commands...", plan.to_create.len());
        }
        applier.create_new(&scope, &plan).await?;
        if opts.global_strategy == GlobalStrategy::Incremental {
            report.created = plan.created_names();
        }

        report.enter(DeployPhase::Updating);
        if logs.status {
            info!("🔁 Updating {} {scope} commands...", plan.to_update.len());
        }
        applier.write_updates(&scope, &plan).await?;
        report.updated = plan.updated_names();
        report.created = plan.created_names();

        if !guild_targets.is_empty() {
            report.enter(DeployPhase::GuildApplying);
            let membership = if opts.check_membership {
                self.membership.as_deref()
            } else {
                None
            };
            report.guilds = applier.apply_guilds(&guild_targets, membership).await;
            if report.guilds.cancelled {
                return Err(DeployError::Cancelled);
            }
        }

        if logs.status {
            info!(
                "✅ {} {scope} commands refreshed ({} created, {} updated, {} deleted)",
                candidates.len(),
                report.created.len(),
                report.updated.len(),
                report.deleted.len()
            );
        }
        Ok(())
    }
}

/// Deploy every definition file in `folder_path`; `true` on success
pub async fn deploy_commands(folder_path: impl AsRef<Path>, options: &DeployOptions) -> bool {
    deploy_commands_with_report(folder_path, options)
        .await
        .success()
}

/// Like [`deploy_commands`] but returns the full report
pub async fn deploy_commands_with_report(
    folder_path: impl AsRef<Path>,
    options: &DeployOptions,
) -> DeployReport {
    let api: Arc<dyn CommandApi> = match RestClient::with_base_url(
        &options.app_token,
        &options.app_id,
        &options.api_base,
        options.http_timeout,
    ) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            let mut report = DeployReport::new();
            report.fail(&err);
            return report;
        }
    };

    let loader =
        DirectoryLoader::new(folder_path.as_ref()).with_extension(&options.file_extension);
    Deployer::new(api.clone(), options.clone())
        .with_membership(Arc::new(RestMembership::new(api)))
        .deploy(&loader)
        .await
}

/// Delete one command by its numeric id, globally or from `options.guild_id`
pub async fn delete_command(command_id: &str, options: &DeleteOptions) -> Result<(), DeployError> {
    validate_ids(command_id, options.guild_id.as_deref())?;
    let api = RestClient::with_base_url(
        &options.app_token,
        &options.app_id,
        &options.api_base,
        options.http_timeout,
    )?;
    delete_command_with(&api, command_id, options.guild_id.as_deref()).await
}

/// [`delete_command`] against any `CommandApi`
pub async fn delete_command_with(
    api: &dyn CommandApi,
    command_id: &str,
    guild_id: Option<&str>,
) -> Result<(), DeployError> {
    validate_ids(command_id, guild_id)?;
    let scope = scope_for(guild_id);
    api.delete_command(&scope, command_id).await?;
    info!("✔️ Deleted command '{command_id}' ({scope})");
    Ok(())
}

/// Delete one command by name, resolving its id in the scope first
pub async fn delete_command_by_name(name: &str, options: &DeleteOptions) -> Result<(), DeployError> {
    let api = RestClient::with_base_url(
        &options.app_token,
        &options.app_id,
        &options.api_base,
        options.http_timeout,
    )?;
    delete_command_by_name_with(&api, name, options.guild_id.as_deref()).await
}

/// [`delete_command_by_name`] against any `CommandApi`
pub async fn delete_command_by_name_with(
    api: &dyn CommandApi,
    name: &str,
    guild_id: Option<&str>,
) -> Result<(), DeployError> {
    if let Some(guild_id) = guild_id {
        if !is_snowflake(guild_id) {
            return Err(DeployError::validation(
                "The guildId is invalid! Must be a numeric string.",
            ));
        }
    }

    let scope = scope_for(guild_id);
    let found = api
        .list_commands(&scope)
        .await?
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| DeployError::NotFound(format!("'{name}' in {scope}")))?;

    api.delete_command(&scope, &found.id).await?;
    info!("✔️ Deleted command '{name}' ({scope})");
    Ok(())
}

/// Fold targets for the development guild into the candidate set for that guild
///
/// Both land in one scope, so they must be diffed as one set. A guild-targeted
/// definition replaces a global one of the same name.
fn merge_development_guild(
    guild_id: &str,
    global: Vec<CommandDefinition>,
    targets: Vec<GuildTarget>,
) -> (Vec<CommandDefinition>, Vec<GuildTarget>) {
    let mut candidates = global;
    let mut rest = Vec::new();
    for target in targets {
        if target.guild_id != guild_id {
            rest.push(target);
            continue;
        }
        match candidates.iter_mut().find(|c| c.name == target.command.name) {
            Some(existing) => *existing = target.command,
            None => candidates.push(target.command),
        }
    }
    (candidates, rest)
}

fn scope_for(guild_id: Option<&str>) -> Scope {
    match guild_id {
        Some(id) => Scope::guild(id),
        None => Scope::Global,
    }
}

fn validate_ids(command_id: &str, guild_id: Option<&str>) -> Result<(), DeployError> {
    if !is_snowflake(command_id) {
        return Err(DeployError::validation(format!(
            "'commandId' is not a numeric string: '{command_id}'"
        )));
    }
    if let Some(guild_id) = guild_id {
        if !is_snowflake(guild_id) {
            return Err(DeployError::validation(
                "The guildId is invalid! Must be a numeric string.",
            ));
        }
    }
    Ok(())
}
