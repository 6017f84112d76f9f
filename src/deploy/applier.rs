//! # Remote Applier
//!
//! Executes a reconciliation plan against the API. Global steps run strictly
//! in order (delete, create, update) and abort on the first remote error.
//! Guild targets run afterwards with failures isolated per guild and command.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.0: Optional per-guild reconciliation and bounded guild concurrency
//! - 1.1.0: Snapshot verification before the first global write
//! - 1.0.0: Initial global and guild application

use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::api::{CommandApi, Scope};
use super::guilds::GuildMembership;
use super::options::{GlobalStrategy, GuildSync, LogOptions};
use crate::commands::{deep_equal, CommandDefinition, GuildTarget, ReconciliationPlan, RemoteCommand};
use crate::core::{DeployError, RemoteError};

/// Knobs the applier reads from the deploy options
#[derive(Debug, Clone)]
pub struct ApplySettings {
    pub logs: LogOptions,
    pub global_strategy: GlobalStrategy,
    pub guild_sync: GuildSync,
    pub guild_concurrency: usize,
    pub guild_ready_timeout: Option<Duration>,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            logs: LogOptions::default(),
            global_strategy: GlobalStrategy::default(),
            guild_sync: GuildSync::default(),
            guild_concurrency: 1,
            guild_ready_timeout: None,
        }
    }
}

/// A guild-scoped command that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GuildFailure {
    pub guild_id: String,
    pub command_name: String,
    pub reason: String,
}

/// Everything the guild phase did
#[derive(Debug, Clone, Default)]
pub struct GuildOutcome {
    /// (guild id, command name) pairs created or overwritten
    pub applied: Vec<(String, String)>,
    /// Pairs already up to date (reconcile mode only)
    pub unchanged: Vec<(String, String)>,
    /// Stale pairs removed (reconcile mode only)
    pub deleted: Vec<(String, String)>,
    pub failures: Vec<GuildFailure>,
    pub cancelled: bool,
}

impl GuildOutcome {
    fn merge(&mut self, other: GuildOutcome) {
        self.applied.extend(other.applied);
        self.unchanged.extend(other.unchanged);
        self.deleted.extend(other.deleted);
        self.failures.extend(other.failures);
        self.cancelled |= other.cancelled;
    }

    fn sort(&mut self) {
        self.applied.sort();
        self.unchanged.sort();
        self.deleted.sort();
        self.failures.sort();
    }

    fn fail(&mut self, guild_id: &str, command_name: &str, reason: impl Into<String>) {
        self.failures.push(GuildFailure {
            guild_id: guild_id.to_string(),
            command_name: command_name.to_string(),
            reason: reason.into(),
        });
    }
}

/// Applies plans and guild targets through a `CommandApi`
pub struct Applier {
    api: Arc<dyn CommandApi>,
    settings: ApplySettings,
    cancel: CancellationToken,
}

impl Applier {
    pub fn new(api: Arc<dyn CommandApi>, settings: ApplySettings, cancel: CancellationToken) -> Self {
        Self {
            api,
            settings,
            cancel,
        }
    }

    fn checkpoint(&self) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            Err(DeployError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Fail if the scope no longer matches the snapshot the plan was built from
    pub async fn verify_snapshot(
        &self,
        scope: &Scope,
        snapshot: &[RemoteCommand],
    ) -> Result<(), DeployError> {
        self.checkpoint()?;
        let current = self.api.list_commands(scope).await?;

        let drifted = current.len() != snapshot.len()
            || current.iter().any(|now| {
                !snapshot.iter().any(|then| {
                    then.id == now.id && then.name == now.name && deep_equal(&then.data, &now.data)
                })
            });

        if drifted {
            return Err(RemoteError::ConcurrentModification(format!(
                "{scope} commands changed ({} read, {} now)",
                snapshot.len(),
                current.len()
            ))
            .into());
        }
        Ok(())
    }

    /// Step (a): delete every stale command individually
    pub async fn delete_stale(&self, scope: &Scope, plan: &ReconciliationPlan) -> Result<(), DeployError> {
        for stale in &plan.to_delete {
            self.checkpoint()?;
            self.api.delete_command(scope, &stale.id).await?;
            if self.settings.logs.deleted {
                info!("✔️ Deleted '{}' ({scope})", stale.name);
            }
        }
        Ok(())
    }

    /// Step (b): create new commands individually (incremental strategy only)
    pub async fn create_new(&self, scope: &Scope, plan: &ReconciliationPlan) -> Result<(), DeployError> {
        if self.settings.global_strategy != GlobalStrategy::Incremental {
            return Ok(());
        }
        for new in &plan.to_create {
            self.checkpoint()?;
            self.api.create_command(scope, &new.data).await?;
            if self.settings.logs.created {
                info!("✔️ Created '{}' ({scope})", new.name);
            }
        }
        Ok(())
    }

    /// Step (c): one bulk overwrite carrying the full candidate set
    ///
    /// Skipped when nothing requires it, so an empty plan issues no write.
    pub async fn write_updates(&self, scope: &Scope, plan: &ReconciliationPlan) -> Result<(), DeployError> {
        let needed = match self.settings.global_strategy {
            GlobalStrategy::Incremental => !plan.to_update.is_empty(),
            GlobalStrategy::BulkReplace => plan.needs_write(),
        };
        if !needed {
            return Ok(());
        }

        self.checkpoint()?;
        self.api
            .overwrite_commands(scope, &plan.candidate_payloads())
            .await?;

        if self.settings.global_strategy == GlobalStrategy::BulkReplace && self.settings.logs.created {
            for new in &plan.to_create {
                info!("✔️ Created '{}' ({scope})", new.name);
            }
        }
        if self.settings.logs.updated {
            for changed in &plan.to_update {
                info!("✔️ Updated '{}' ({scope})", changed.name);
            }
        }
        Ok(())
    }

    /// Apply every guild target, isolating failures per guild and command
    ///
    /// With a membership source, targets outside the bot's guilds are reported
    /// as failures without a network call.
    pub async fn apply_guilds(
        &self,
        targets: &[GuildTarget],
        membership: Option<&dyn GuildMembership>,
    ) -> GuildOutcome {
        let mut outcome = GuildOutcome::default();
        if targets.is_empty() {
            return outcome;
        }

        let mut by_guild: BTreeMap<String, Vec<CommandDefinition>> = BTreeMap::new();
        for target in targets {
            by_guild
                .entry(target.guild_id.clone())
                .or_default()
                .push(target.command.clone());
        }

        let members = match membership {
            None => None,
            Some(source) => match source
                .wait_ready(self.settings.guild_ready_timeout, &self.cancel)
                .await
            {
                Ok(members) => Some(members),
                Err(DeployError::Cancelled) => {
                    outcome.cancelled = true;
                    return outcome;
                }
                Err(err) => {
                    error!("❌ Couldn't resolve guild membership: {err}");
                    for target in targets {
                        outcome.fail(&target.guild_id, &target.command.name, err.to_string());
                    }
                    outcome.sort();
                    return outcome;
                }
            },
        };

        if self.settings.logs.status {
            info!(
                "🔁 Updating {} guild commands across {} guilds...",
                targets.len(),
                by_guild.len()
            );
        }

        let members = members.as_ref();
        let results: Vec<GuildOutcome> = stream::iter(by_guild)
            .map(|(guild_id, commands)| async move {
                self.apply_guild(&guild_id, &commands, members).await
            })
            .buffer_unordered(self.settings.guild_concurrency.max(1))
            .collect()
            .await;

        for result in results {
            outcome.merge(result);
        }
        outcome.sort();

        if self.settings.logs.updated {
            info!("✅ Updated {} guild commands.", outcome.applied.len());
        }
        outcome
    }

    async fn apply_guild(
        &self,
        guild_id: &str,
        commands: &[CommandDefinition],
        members: Option<&HashSet<String>>,
    ) -> GuildOutcome {
        let mut outcome = GuildOutcome::default();

        if self.cancel.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }

        if members.is_some_and(|m| !m.contains(guild_id)) {
            for command in commands {
                warn!(
                    "⚠️ Couldn't update '{}' since guild '{guild_id}' wasn't found in the current guilds.",
                    command.name
                );
                outcome.fail(guild_id, &command.name, "bot is not a member of this guild");
            }
            return outcome;
        }

        let scope = Scope::guild(guild_id);
        let to_post: Vec<&CommandDefinition> = match self.settings.guild_sync {
            GuildSync::CreateOnly => commands.iter().collect(),
            GuildSync::Reconcile => match self.api.list_commands(&scope).await {
                Ok(remote) => {
                    let plan = ReconciliationPlan::compute(commands, &remote);
                    self.delete_guild_stale(guild_id, &plan, &mut outcome).await;
                    if outcome.cancelled {
                        return outcome;
                    }
                    let changed: HashSet<&str> = plan
                        .to_create
                        .iter()
                        .chain(&plan.to_update)
                        .map(|c| c.name.as_str())
                        .collect();
                    for command in commands.iter().filter(|c| !changed.contains(c.name.as_str())) {
                        outcome
                            .unchanged
                            .push((guild_id.to_string(), command.name.clone()));
                    }
                    commands
                        .iter()
                        .filter(|c| changed.contains(c.name.as_str()))
                        .collect()
                }
                Err(err) => {
                    error!("❌ Couldn't list commands in guild '{guild_id}': {err}");
                    for command in commands {
                        outcome.fail(guild_id, &command.name, err.to_string());
                    }
                    return outcome;
                }
            },
        };

        for command in to_post {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match self.api.create_command(&scope, &command.data).await {
                Ok(_) => {
                    if self.settings.logs.updated {
                        info!("✔️ Updated command '{}' in guild '{guild_id}'.", command.name);
                    }
                    outcome
                        .applied
                        .push((guild_id.to_string(), command.name.clone()));
                }
                Err(err) => {
                    error!(
                        "❌ Couldn't update '{}' in guild '{guild_id}': {err}",
                        command.name
                    );
                    outcome.fail(guild_id, &command.name, err.to_string());
                }
            }
        }

        outcome
    }

    async fn delete_guild_stale(&self, guild_id: &str, plan: &ReconciliationPlan, outcome: &mut GuildOutcome) {
        let scope = Scope::guild(guild_id);
        for stale in &plan.to_delete {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return;
            }
            match self.api.delete_command(&scope, &stale.id).await {
                Ok(()) => {
                    if self.settings.logs.deleted {
                        info!("✔️ Deleted '{}' in guild '{guild_id}'", stale.name);
                    }
                    outcome.deleted.push((guild_id.to_string(), stale.name.clone()));
                }
                Err(err) => {
                    error!("❌ Couldn't delete '{}' in guild '{guild_id}': {err}", stale.name);
                    outcome.fail(guild_id, &stale.name, err.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::fake::FakeApi;
    use crate::deploy::guilds::StaticMembership;
    use serde_json::{json, Value};

    fn def(name: &str, data: Value) -> CommandDefinition {
        let mut data = data;
        data["name"] = json!(name);
        CommandDefinition::new(data).unwrap()
    }

    fn target(guild_id: &str, command: CommandDefinition) -> GuildTarget {
        GuildTarget {
            guild_id: guild_id.to_string(),
            command,
        }
    }

    fn applier(api: &Arc<FakeApi>, settings: ApplySettings) -> Applier {
        Applier::new(api.clone(), settings, CancellationToken::new())
    }

    fn quiet() -> ApplySettings {
        ApplySettings {
            logs: LogOptions::none(),
            ..ApplySettings::default()
        }
    }

    async fn apply_global(applier: &Applier, plan: &ReconciliationPlan) -> Result<(), DeployError> {
        applier.delete_stale(&Scope::Global, plan).await?;
        applier.create_new(&Scope::Global, plan).await?;
        applier.write_updates(&Scope::Global, plan).await
    }

    #[tokio::test]
    async fn test_incremental_order_and_end_state() {
        let api = Arc::new(FakeApi::new().with_global(vec![
            json!({"name": "old"}),
            json!({"name": "ping", "description": "v1"}),
        ]));
        let local = vec![
            def("ping", json!({"description": "v2"})),
            def("new", json!({"description": "fresh"})),
        ];
        let remote = api.list_commands(&Scope::Global).await.unwrap();
        let plan = ReconciliationPlan::compute(&local, &remote);

        apply_global(&applier(&api, quiet()), &plan).await.unwrap();

        let writes = api.writes();
        assert!(writes[0].starts_with("DELETE global"));
        assert_eq!(writes[1], "POST global new");
        assert_eq!(writes[2], "PUT global 2");
        assert_eq!(api.global_names(), vec!["new", "ping"]);

        let after = api.list_commands(&Scope::Global).await.unwrap();
        assert!(ReconciliationPlan::compute(&local, &after).is_empty());
    }

    #[tokio::test]
    async fn test_incremental_without_updates_skips_overwrite() {
        let api = Arc::new(FakeApi::new());
        let plan = ReconciliationPlan::compute(&[def("ping", json!({}))], &[]);

        apply_global(&applier(&api, quiet()), &plan).await.unwrap();

        assert_eq!(api.writes(), vec!["POST global ping"]);
    }

    #[tokio::test]
    async fn test_bulk_replace_single_write_after_deletes() {
        let api = Arc::new(FakeApi::new().with_global(vec![json!({"name": "old"})]));
        let local = vec![def("a", json!({})), def("b", json!({}))];
        let remote = api.list_commands(&Scope::Global).await.unwrap();
        let plan = ReconciliationPlan::compute(&local, &remote);

        let settings = ApplySettings {
            global_strategy: GlobalStrategy::BulkReplace,
            ..quiet()
        };
        apply_global(&applier(&api, settings), &plan).await.unwrap();

        let writes = api.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].starts_with("DELETE global"));
        assert_eq!(writes[1], "PUT global 2");
        assert_eq!(api.global_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_plan_issues_no_writes() {
        let api = Arc::new(FakeApi::new());
        let plan = ReconciliationPlan::compute(&[], &[]);
        apply_global(&applier(&api, quiet()), &plan).await.unwrap();
        assert!(api.writes().is_empty());
    }

    #[tokio::test]
    async fn test_global_remote_error_aborts() {
        let api = Arc::new(FakeApi::new());
        api.state.lock().unwrap().fail_global_writes = true;
        let plan = ReconciliationPlan::compute(&[def("a", json!({})), def("b", json!({}))], &[]);

        let err = apply_global(&applier(&api, quiet()), &plan).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(api.writes(), vec!["POST global a"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let api = Arc::new(FakeApi::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let applier = Applier::new(api.clone(), quiet(), cancel);
        let plan = ReconciliationPlan::compute(&[def("a", json!({}))], &[]);

        let err = applier.create_new(&Scope::Global, &plan).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_verify_snapshot_detects_drift() {
        let api = Arc::new(FakeApi::new().with_global(vec![json!({"name": "a"})]));
        let snapshot = api.list_commands(&Scope::Global).await.unwrap();
        let applier = applier(&api, quiet());

        applier.verify_snapshot(&Scope::Global, &snapshot).await.unwrap();

        api.state.lock().unwrap().drift_on_list = Some(3);
        let err = applier
            .verify_snapshot(&Scope::Global, &snapshot)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("changed"));
    }

    #[tokio::test]
    async fn test_guild_failure_is_isolated() {
        let api = Arc::new(FakeApi::new());
        api.state.lock().unwrap().failing_guilds.insert("20".to_string());
        let secret = def("secret", json!({}));
        let targets = vec![
            target("10", secret.clone()),
            target("20", secret.clone()),
            target("30", secret),
        ];

        let outcome = applier(&api, quiet()).apply_guilds(&targets, None).await;

        assert_eq!(
            outcome.applied,
            vec![
                ("10".to_string(), "secret".to_string()),
                ("30".to_string(), "secret".to_string())
            ]
        );
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].guild_id, "20");
        assert!(!outcome.cancelled);
        assert_eq!(api.guild_names("30"), vec!["secret"]);
    }

    #[tokio::test]
    async fn test_non_member_guild_skipped_without_call() {
        let api = Arc::new(FakeApi::new());
        let secret = def("secret", json!({}));
        let targets = vec![target("10", secret.clone()), target("99", secret)];
        let membership = StaticMembership::new(["10"]);

        let outcome = applier(&api, quiet())
            .apply_guilds(&targets, Some(&membership))
            .await;

        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].guild_id, "99");
        assert!(!api.calls().iter().any(|c| c.contains("guild 99")));
    }

    #[tokio::test]
    async fn test_parallel_guilds_apply_everything() {
        let api = Arc::new(FakeApi::new());
        let targets: Vec<GuildTarget> = (1..=6)
            .flat_map(|g| {
                vec![
                    target(&g.to_string(), def("a", json!({}))),
                    target(&g.to_string(), def("b", json!({}))),
                ]
            })
            .collect();
        let settings = ApplySettings {
            guild_concurrency: 3,
            ..quiet()
        };

        let outcome = applier(&api, settings).apply_guilds(&targets, None).await;

        assert_eq!(outcome.applied.len(), 12);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.applied[0], ("1".to_string(), "a".to_string()));
    }

    #[tokio::test]
    async fn test_reconcile_deletes_stale_and_skips_unchanged() {
        let api = Arc::new(FakeApi::new());
        {
            let guild = Scope::guild("10");
            api.create_command(&guild, &json!({"name": "keep"})).await.unwrap();
            api.create_command(&guild, &json!({"name": "stale"})).await.unwrap();
        }
        let targets = vec![
            target("10", def("keep", json!({}))),
            target("10", def("fresh", json!({}))),
        ];
        let settings = ApplySettings {
            guild_sync: GuildSync::Reconcile,
            ..quiet()
        };

        let outcome = applier(&api, settings).apply_guilds(&targets, None).await;

        assert_eq!(outcome.applied, vec![("10".to_string(), "fresh".to_string())]);
        assert_eq!(outcome.unchanged, vec![("10".to_string(), "keep".to_string())]);
        assert_eq!(outcome.deleted, vec![("10".to_string(), "stale".to_string())]);
        assert_eq!(api.guild_names("10"), vec!["fresh", "keep"]);
    }

    #[tokio::test]
    async fn test_cancelled_guild_phase() {
        let api = Arc::new(FakeApi::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let applier = Applier::new(api.clone(), quiet(), cancel);

        let outcome = applier
            .apply_guilds(&[target("10", def("a", json!({})))], None)
            .await;

        assert!(outcome.cancelled);
        assert!(outcome.applied.is_empty());
        assert!(api.calls().is_empty());
    }
}
