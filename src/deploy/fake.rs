//! In-memory `CommandApi` for tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::api::{CommandApi, Scope};
use crate::commands::RemoteCommand;
use crate::core::{DeployError, RemoteError};

#[derive(Default)]
pub(crate) struct FakeState {
    pub global: Vec<RemoteCommand>,
    pub guilds: BTreeMap<String, Vec<RemoteCommand>>,
    pub member_guilds: Vec<String>,
    /// Guild-scoped calls into these guilds answer 403
    pub failing_guilds: HashSet<String>,
    /// Global writes (POST/PUT/DELETE) answer 500
    pub fail_global_writes: bool,
    /// On this global list call (1-based), another writer sneaks a command in
    pub drift_on_list: Option<usize>,
    pub global_lists: usize,
    pub calls: Vec<String>,
    next_id: u64,
}

impl FakeState {
    fn assign(&mut self, mut data: Value, existing: Option<&RemoteCommand>) -> RemoteCommand {
        let id = match existing {
            Some(current) => current.id.clone(),
            None => {
                self.next_id += 1;
                (1000 + self.next_id).to_string()
            }
        };
        data["id"] = json!(id);
        data["application_id"] = json!("42");
        data["version"] = json!("1");
        RemoteCommand::from_api(data).unwrap()
    }

    fn scope_mut(&mut self, scope: &Scope) -> &mut Vec<RemoteCommand> {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Guild(id) => self.guilds.entry(id.clone()).or_default(),
        }
    }
}

pub(crate) struct FakeApi {
    pub state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Seed the global scope with schema payloads
    pub fn with_global(self, payloads: Vec<Value>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for payload in payloads {
                let cmd = state.assign(payload, None);
                state.global.push(cmd);
            }
        }
        self
    }

    pub fn with_members(self, guilds: &[&str]) -> Self {
        self.state.lock().unwrap().member_guilds = guilds.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn global_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .global
            .iter()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn guild_names(&self, guild_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .guilds
            .get(guild_id)
            .map(|cmds| cmds.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change remote state
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("GET"))
            .collect()
    }

    fn check(state: &FakeState, scope: &Scope, method: &str) -> Result<(), DeployError> {
        let failing = match scope {
            Scope::Global => method != "GET" && state.fail_global_writes,
            Scope::Guild(id) => state.failing_guilds.contains(id),
        };
        if failing {
            let status = if matches!(scope, Scope::Global) { 500 } else { 403 };
            return Err(RemoteError::Http {
                method: method.to_string(),
                route: scope.to_string(),
                status,
                message: "Missing Access".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CommandApi for FakeApi {
    async fn list_commands(&self, scope: &Scope) -> Result<Vec<RemoteCommand>, DeployError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("GET {scope}"));
        Self::check(&state, scope, "GET")?;

        if matches!(scope, Scope::Global) {
            state.global_lists += 1;
            if state.drift_on_list == Some(state.global_lists) {
                let intruder = state.assign(json!({"name": "intruder"}), None);
                state.global.push(intruder);
            }
        }
        Ok(state.scope_mut(scope).clone())
    }

    async fn create_command(
        &self,
        scope: &Scope,
        data: &Value,
    ) -> Result<RemoteCommand, DeployError> {
        let mut state = self.state.lock().unwrap();
        let name = data["name"].as_str().unwrap_or_default().to_string();
        state.calls.push(format!("POST {scope} {name}"));
        Self::check(&state, scope, "POST")?;

        let existing = state.scope_mut(scope).iter().find(|c| c.name == name).cloned();
        let created = state.assign(data.clone(), existing.as_ref());
        let commands = state.scope_mut(scope);
        commands.retain(|c| c.name != name);
        commands.push(created.clone());
        Ok(created)
    }

    async fn overwrite_commands(
        &self,
        scope: &Scope,
        payloads: &[Value],
    ) -> Result<Vec<RemoteCommand>, DeployError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("PUT {scope} {}", payloads.len()));
        Self::check(&state, scope, "PUT")?;

        let previous = state.scope_mut(scope).clone();
        let mut replaced = Vec::new();
        for payload in payloads {
            let existing = previous.iter().find(|c| c.name == payload["name"]);
            replaced.push(state.assign(payload.clone(), existing));
        }
        *state.scope_mut(scope) = replaced.clone();
        Ok(replaced)
    }

    async fn delete_command(&self, scope: &Scope, command_id: &str) -> Result<(), DeployError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("DELETE {scope} {command_id}"));
        Self::check(&state, scope, "DELETE")?;

        let commands = state.scope_mut(scope);
        let before = commands.len();
        commands.retain(|c| c.id != command_id);
        if commands.len() == before {
            return Err(RemoteError::Http {
                method: "DELETE".to_string(),
                route: scope.to_string(),
                status: 404,
                message: "Unknown application command".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn list_guild_ids(&self) -> Result<Vec<String>, DeployError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("GET guilds".to_string());
        Ok(state.member_guilds.clone())
    }
}
