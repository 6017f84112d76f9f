//! # Command Loader
//!
//! Reads a flat directory of command definition files. Each file holds
//! `{ data, guildIds?, ignore? }` as JSON, or YAML for `.yaml`/`.yml` files.
//!
//! - **Version**: 1.1.1
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.1: Follow symlinked definition files
//! - 1.1.0: YAML definition files
//! - 1.0.0: Initial JSON loader with extension filter

use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::definition::RawDefinition;
use super::source::{CommandSource, LoadOutcome};
use crate::core::DeployError;

/// Extension used when none is configured
pub const DEFAULT_FILE_EXTENSION: &str = ".json";

/// Loads definitions from the files directly inside one directory
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
    extension: String,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }

    /// Only load files ending in `extension` (leading dot optional)
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = normalize_extension(extension);
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Eligible files in file-name order, plus the entries that couldn't be inspected
    ///
    /// Symlinks are followed, so a linked definition file counts as a file.
    async fn eligible_files(&self) -> Result<(Vec<PathBuf>, Vec<DeployError>), DeployError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| DeployError::load(&self.dir, format!("cannot read directory: {e}")))?;

        let mut files = Vec::new();
        let mut errors = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DeployError::load(&self.dir, format!("cannot list directory: {e}")))?
        {
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&self.extension));
            if !matches {
                continue;
            }

            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => files.push(path),
                Ok(_) => debug!("Skipping non-file entry {}", path.display()),
                Err(e) => errors.push(DeployError::load(&path, format!("cannot inspect entry: {e}"))),
            }
        }

        files.sort();
        errors.sort_by_key(|e| e.to_string());
        Ok((files, errors))
    }
}

#[async_trait]
impl CommandSource for DirectoryLoader {
    async fn load(&self) -> Result<LoadOutcome, DeployError> {
        let (files, errors) = self.eligible_files().await?;
        let mut outcome = LoadOutcome::default();
        for err in errors {
            warn!("- {err}");
            outcome.errors.push(err);
        }

        for path in files {
            match load_file(&path).await {
                Ok(definition) => {
                    debug!("Loaded command '{}' from {}", definition.name, path.display());
                    outcome.definitions.push(definition);
                }
                Err(err) => {
                    warn!("- {err}");
                    outcome.errors.push(err);
                }
            }
        }

        Ok(outcome)
    }

    fn describe(&self) -> String {
        format!("{}/*{}", self.dir.display(), self.extension)
    }
}

async fn load_file(path: &Path) -> Result<super::CommandDefinition, DeployError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DeployError::load(path, e.to_string()))?;

    let raw: RawDefinition = if is_yaml(path) {
        serde_yaml::from_str(&contents).map_err(|e| DeployError::load(path, e.to_string()))?
    } else {
        serde_json::from_str(&contents).map_err(|e| DeployError::load(path, e.to_string()))?
    };

    raw.into_definition()
        .map_err(|reason| DeployError::load(path, reason))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() {
        DEFAULT_FILE_EXTENSION.to_string()
    } else if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}
