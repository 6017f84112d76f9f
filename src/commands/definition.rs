//! Command value types shared by every pipeline stage
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Strip server-assigned fields from remote payloads before comparison
//! - 1.0.0: Initial definition, remote command and guild target types

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::core::DeployError;

/// Fields the API adds to a command that a local definition never carries
pub const SERVER_ASSIGNED_FIELDS: &[&str] = &["id", "application_id", "guild_id", "version"];

/// A locally declared application command
///
/// `name` always mirrors `data.name`. A definition with any guild ids is
/// guild-scoped and never part of the global set.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDefinition {
    pub name: String,
    pub data: Value,
    pub guild_ids: BTreeSet<String>,
    pub ignore: bool,
}

impl CommandDefinition {
    /// Build a global definition from a command schema object
    pub fn new(data: Value) -> Result<Self, DeployError> {
        let name = schema_name(&data).map_err(DeployError::validation)?;
        Ok(Self {
            name,
            data,
            guild_ids: BTreeSet::new(),
            ignore: false,
        })
    }

    /// Restrict the definition to the given guilds
    pub fn with_guild_ids<I, S>(mut self, guild_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guild_ids = guild_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignored(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn is_global(&self) -> bool {
        self.guild_ids.is_empty()
    }
}

/// On-disk shape of a definition file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDefinition {
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default, alias = "guild_ids")]
    pub guild_ids: Vec<String>,

    #[serde(default)]
    pub ignore: bool,
}

impl RawDefinition {
    /// Validate the raw file contents into a definition
    pub fn into_definition(self) -> Result<CommandDefinition, String> {
        let data = match self.data {
            Some(Value::Null) | None => return Err("missing the 'data' property".to_string()),
            Some(data) => data,
        };
        let name = schema_name(&data)?;

        if let Some(bad) = self.guild_ids.iter().find(|id| !is_snowflake(id)) {
            return Err(format!("guild id '{bad}' is not a numeric string"));
        }

        Ok(CommandDefinition {
            name,
            data,
            guild_ids: self.guild_ids.into_iter().collect(),
            ignore: self.ignore,
        })
    }
}

/// A command as currently registered on the API for one scope
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommand {
    pub id: String,
    pub name: String,
    pub data: Value,
}

impl RemoteCommand {
    /// Convert an API payload, removing the fields the server assigns
    pub fn from_api(mut payload: Value) -> Result<Self, String> {
        let object = payload
            .as_object_mut()
            .ok_or_else(|| "command payload is not an object".to_string())?;

        let id = match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err("command payload has no 'id'".to_string()),
        };

        for field in SERVER_ASSIGNED_FIELDS {
            object.remove(*field);
        }

        let name = schema_name(&payload)?;
        Ok(Self {
            id,
            name,
            data: payload,
        })
    }
}

/// One (guild, command) pair to apply in the guild phase
#[derive(Debug, Clone, PartialEq)]
pub struct GuildTarget {
    pub guild_id: String,
    pub command: CommandDefinition,
}

/// Discord ids are unsigned integers serialised as strings
pub fn is_snowflake(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

fn schema_name(data: &Value) -> Result<String, String> {
    let object = data
        .as_object()
        .ok_or_else(|| "'data' is not an object".to_string())?;
    match object.get("name") {
        Some(Value::String(name)) if !name.is_empty() => Ok(name.clone()),
        _ => Err("'data' has no string 'name'".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_reads_name_from_data() {
        let def = CommandDefinition::new(json!({"name": "ping", "description": "Pong"})).unwrap();
        assert_eq!(def.name, "ping");
        assert!(def.is_global());
        assert!(!def.ignore);
    }

    #[test]
    fn test_new_rejects_nameless_data() {
        assert!(CommandDefinition::new(json!({"description": "no name"})).is_err());
        assert!(CommandDefinition::new(json!("ping")).is_err());
    }

    #[test]
    fn test_guild_ids_collapse_duplicates() {
        let def = CommandDefinition::new(json!({"name": "ping"}))
            .unwrap()
            .with_guild_ids(["2", "1", "2"]);
        assert_eq!(def.guild_ids.len(), 2);
        assert!(!def.is_global());
        assert_eq!(def.guild_ids.iter().next().unwrap(), "1");
    }

    #[test]
    fn test_raw_definition_camel_and_snake_case() {
        let camel: RawDefinition =
            serde_json::from_value(json!({"data": {"name": "a"}, "guildIds": ["1"]})).unwrap();
        let snake: RawDefinition =
            serde_json::from_value(json!({"data": {"name": "a"}, "guild_ids": ["1"]})).unwrap();
        assert_eq!(camel.guild_ids, vec!["1"]);
        assert_eq!(snake.guild_ids, vec!["1"]);
    }

    #[test]
    fn test_raw_definition_without_data_fails() {
        let raw: RawDefinition = serde_json::from_value(json!({"ignore": true})).unwrap();
        let err = raw.into_definition().unwrap_err();
        assert!(err.contains("'data'"));
    }

    #[test]
    fn test_raw_definition_rejects_non_numeric_guild() {
        let raw: RawDefinition =
            serde_json::from_value(json!({"data": {"name": "a"}, "guildIds": ["abc"]})).unwrap();
        assert!(raw.into_definition().is_err());
    }

    #[test]
    fn test_remote_from_api_strips_server_fields() {
        let remote = RemoteCommand::from_api(json!({
            "id": "1100",
            "application_id": "42",
            "version": "1200",
            "name": "ping",
            "description": "Pong"
        }))
        .unwrap();

        assert_eq!(remote.id, "1100");
        assert_eq!(remote.name, "ping");
        assert_eq!(remote.data, json!({"name": "ping", "description": "Pong"}));
    }

    #[test]
    fn test_remote_from_api_requires_id() {
        assert!(RemoteCommand::from_api(json!({"name": "ping"})).is_err());
    }

    #[test]
    fn test_is_snowflake() {
        assert!(is_snowflake("123456789012345678"));
        assert!(!is_snowflake(""));
        assert!(!is_snowflake("12a"));
        assert!(!is_snowflake("-1"));
    }
}
