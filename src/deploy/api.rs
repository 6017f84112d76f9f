//! Remote command API seam
//!
//! The applier only talks to the API through `CommandApi`, so the HTTP
//! client can be swapped for an in-memory one in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::commands::RemoteCommand;
use crate::core::DeployError;

/// Where a command lives on the API
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Guild(String),
}

impl Scope {
    pub fn guild(guild_id: impl Into<String>) -> Self {
        Self::Guild(guild_id.into())
    }

    pub fn guild_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Guild(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Guild(id) => write!(f, "guild {id}"),
        }
    }
}

/// Operations the sync pipeline needs from the application command API
///
/// Every call is a single request with no retries.
#[async_trait]
pub trait CommandApi: Send + Sync {
    /// List the commands registered in a scope
    async fn list_commands(&self, scope: &Scope) -> Result<Vec<RemoteCommand>, DeployError>;

    /// Create one command, or overwrite the one with the same name
    async fn create_command(&self, scope: &Scope, data: &Value)
        -> Result<RemoteCommand, DeployError>;

    /// Replace the whole command set of a scope in one call
    async fn overwrite_commands(
        &self,
        scope: &Scope,
        commands: &[Value],
    ) -> Result<Vec<RemoteCommand>, DeployError>;

    /// Delete one command by id
    async fn delete_command(&self, scope: &Scope, command_id: &str) -> Result<(), DeployError>;

    /// Ids of every guild the application's bot user belongs to
    async fn list_guild_ids(&self) -> Result<Vec<String>, DeployError>;
}
