//! # State Differ
//!
//! Computes the create/update/delete plan that makes one remote scope match
//! the local candidate set. Pure: no I/O, no logging.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use serde_json::Value;
use std::collections::HashMap;

use super::definition::{CommandDefinition, RemoteCommand};
use super::equality::deep_equal;

/// Operations needed to reconcile one scope
///
/// A name appears in at most one of the three lists. The plan also keeps the
/// candidate set it was computed from, since a bulk overwrite sends it whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<CommandDefinition>,
    pub to_update: Vec<CommandDefinition>,
    pub to_delete: Vec<RemoteCommand>,
    candidates: Vec<CommandDefinition>,
}

impl ReconciliationPlan {
    /// Diff candidate set `local` against remote set `remote`
    ///
    /// Names are matched exactly and case-sensitively. Output order follows
    /// `local` for creations and updates and `remote` for deletions.
    pub fn compute(local: &[CommandDefinition], remote: &[RemoteCommand]) -> Self {
        let remote_by_name: HashMap<&str, &RemoteCommand> =
            remote.iter().map(|cmd| (cmd.name.as_str(), cmd)).collect();

        let mut to_create = Vec::new();
        let mut to_update = Vec::new();

        for candidate in local {
            match remote_by_name.get(candidate.name.as_str()) {
                None => to_create.push(candidate.clone()),
                Some(current) if !deep_equal(&candidate.data, &current.data) => {
                    to_update.push(candidate.clone())
                }
                Some(_) => {}
            }
        }

        let to_delete = remote
            .iter()
            .filter(|current| !local.iter().any(|c| c.name == current.name))
            .cloned()
            .collect();

        Self {
            to_create,
            to_update,
            to_delete,
            candidates: local.to_vec(),
        }
    }

    /// True once local and remote have converged
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Whether any write other than deletions is needed
    pub fn needs_write(&self) -> bool {
        !self.to_create.is_empty() || !self.to_update.is_empty()
    }

    /// The full candidate set the plan was computed from
    pub fn candidates(&self) -> &[CommandDefinition] {
        &self.candidates
    }

    /// Schema payloads of every candidate, for a bulk overwrite
    pub fn candidate_payloads(&self) -> Vec<Value> {
        self.candidates.iter().map(|c| c.data.clone()).collect()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.to_create.iter().map(|c| c.name.clone()).collect()
    }

    pub fn updated_names(&self) -> Vec<String> {
        self.to_update.iter().map(|c| c.name.clone()).collect()
    }

    pub fn deleted_names(&self) -> Vec<String> {
        self.to_delete.iter().map(|c| c.name.clone()).collect()
    }
}
