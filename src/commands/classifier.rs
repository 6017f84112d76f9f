//! # Command Classifier
//!
//! Splits loaded definitions into ignored, global and guild-scoped buckets.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Add `DuplicatePolicy::Reject` for colliding global names
//! - 1.0.0: Initial last-write-wins classification

use log::warn;
use std::collections::HashMap;
use std::str::FromStr;

use super::definition::{CommandDefinition, GuildTarget};
use crate::core::DeployError;

/// What to do when two global definitions share a name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// The later definition replaces the earlier one in place
    #[default]
    LastWriteWins,
    /// A collision fails the whole invocation
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "last_write_wins" | "overwrite" => Ok(Self::LastWriteWins),
            "reject" | "error" => Ok(Self::Reject),
            other => Err(DeployError::config(format!(
                "Unknown duplicate policy '{other}' (expected last_write_wins or reject)"
            ))),
        }
    }
}

/// Definitions sorted into disjoint buckets
#[derive(Debug, Clone, Default)]
pub struct Classified {
    pub ignored: Vec<CommandDefinition>,
    pub global: Vec<CommandDefinition>,
    pub guild_scoped: Vec<GuildTarget>,
}

impl Classified {
    /// Every guild id any target refers to, sorted
    pub fn target_guilds(&self) -> Vec<String> {
        let mut guilds: Vec<String> = self
            .guild_scoped
            .iter()
            .map(|t| t.guild_id.clone())
            .collect();
        guilds.sort();
        guilds.dedup();
        guilds
    }

    pub fn ignored_names(&self) -> Vec<String> {
        self.ignored.iter().map(|c| c.name.clone()).collect()
    }
}

/// Classify definitions in load order
pub fn classify(
    definitions: Vec<CommandDefinition>,
    policy: DuplicatePolicy,
) -> Result<Classified, DeployError> {
    let mut classified = Classified::default();
    let mut global_index: HashMap<String, usize> = HashMap::new();

    for definition in definitions {
        if definition.ignore {
            classified.ignored.push(definition);
            continue;
        }

        if definition.is_global() {
            match global_index.get(&definition.name) {
                Some(&slot) => match policy {
                    DuplicatePolicy::LastWriteWins => {
                        warn!(
                            "⚠️ Duplicate global command '{}', the later definition wins",
                            definition.name
                        );
                        classified.global[slot] = definition;
                    }
                    DuplicatePolicy::Reject => {
                        return Err(DeployError::validation(format!(
                            "Duplicate global command name '{}'",
                            definition.name
                        )));
                    }
                },
                None => {
                    global_index.insert(definition.name.clone(), classified.global.len());
                    classified.global.push(definition);
                }
            }
            continue;
        }

        for guild_id in &definition.guild_ids {
            classified.guild_scoped.push(GuildTarget {
                guild_id: guild_id.clone(),
                command: definition.clone(),
            });
        }
    }

    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str, marker: i64) -> CommandDefinition {
        CommandDefinition::new(json!({"name": name, "marker": marker})).unwrap()
    }

    #[test]
    fn test_buckets_are_disjoint() {
        let defs = vec![
            def("ping", 1),
            def("secret", 2).with_guild_ids(["10", "20"]),
            def("draft", 3).ignored(true),
            def("draft_guild", 4).with_guild_ids(["10"]).ignored(true),
        ];
        let classified = classify(defs, DuplicatePolicy::default()).unwrap();

        assert_eq!(classified.ignored_names(), vec!["draft", "draft_guild"]);
        assert_eq!(classified.global.len(), 1);
        assert_eq!(classified.global[0].name, "ping");
        assert_eq!(classified.guild_scoped.len(), 2);
        assert!(classified
            .guild_scoped
            .iter()
            .all(|t| t.command.name == "secret"));
        assert_eq!(classified.target_guilds(), vec!["10", "20"]);
    }

    #[test]
    fn test_duplicate_global_last_write_wins() {
        let defs = vec![def("ping", 1), def("other", 2), def("ping", 3)];
        let classified = classify(defs, DuplicatePolicy::LastWriteWins).unwrap();

        assert_eq!(classified.global.len(), 2);
        assert_eq!(classified.global[0].name, "ping");
        assert_eq!(classified.global[0].data["marker"], 3);
        assert_eq!(classified.global[1].name, "other");
    }

    #[test]
    fn test_duplicate_global_rejected() {
        let defs = vec![def("ping", 1), def("ping", 2)];
        let err = classify(defs, DuplicatePolicy::Reject).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_same_name_global_and_guild_do_not_collide() {
        let defs = vec![def("ping", 1), def("ping", 2).with_guild_ids(["5"])];
        let classified = classify(defs, DuplicatePolicy::Reject).unwrap();
        assert_eq!(classified.global.len(), 1);
        assert_eq!(classified.guild_scoped.len(), 1);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "reject".parse::<DuplicatePolicy>().unwrap(),
            DuplicatePolicy::Reject
        );
        assert_eq!(
            "last-write-wins".parse::<DuplicatePolicy>().unwrap(),
            DuplicatePolicy::LastWriteWins
        );
        assert!("sometimes".parse::<DuplicatePolicy>().is_err());
    }
}
