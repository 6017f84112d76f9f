//! Command supplier seam
//!
//! Hosts hand the pipeline a `CommandSource` instead of a module system. The
//! filesystem loader is one implementation, `StaticSource` another.

use async_trait::async_trait;

use super::definition::CommandDefinition;
use crate::core::DeployError;

/// Definitions produced by one load, plus the per-item failures that were skipped
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub definitions: Vec<CommandDefinition>,
    pub errors: Vec<DeployError>,
}

/// Supplies candidate command definitions in a stable order
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Load every definition
    ///
    /// Per-item problems go into `LoadOutcome::errors`; an `Err` means the
    /// source as a whole is unusable.
    async fn load(&self) -> Result<LoadOutcome, DeployError>;

    /// Human-readable origin, used in log lines
    fn describe(&self) -> String;
}

/// Definitions built in code by the host
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    definitions: Vec<CommandDefinition>,
}

impl StaticSource {
    pub fn new(definitions: Vec<CommandDefinition>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl CommandSource for StaticSource {
    async fn load(&self) -> Result<LoadOutcome, DeployError> {
        Ok(LoadOutcome {
            definitions: self.definitions.clone(),
            errors: Vec::new(),
        })
    }

    fn describe(&self) -> String {
        format!("{} in-memory definitions", self.definitions.len())
    }
}
