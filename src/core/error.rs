//! # Deploy Errors
//!
//! Typed error taxonomy shared by every stage of the command sync pipeline.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Split remote failures into `RemoteError`, add snapshot drift and membership timeout
//! - 1.0.0: Initial load/validation/remote taxonomy

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading, planning or applying command changes
#[derive(Error, Debug, Clone)]
pub enum DeployError {
    /// A single definition file could not be used. Loading continues.
    #[error("Failed to load '{}': {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Caller contract violation, rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or API failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A command looked up by name does not exist in the scope
    #[error("Command not found: {0}")]
    NotFound(String),

    /// The invocation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid environment or option configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures talking to the remote command API
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// The API answered with a non-success status
    #[error("{method} {route} returned HTTP {status}: {message}")]
    Http {
        method: String,
        route: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response (connect, timeout, decode)
    #[error("{method} {route} failed: {message}")]
    Transport {
        method: String,
        route: String,
        message: String,
    },

    /// Remote state changed between planning and applying
    #[error("Remote commands changed since they were read: {0}")]
    ConcurrentModification(String),

    /// Guild membership never became available
    #[error("Guild membership unavailable: {0}")]
    MembershipUnavailable(String),
}

impl DeployError {
    /// Creates a Load error
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of a remote failure, if the API answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote(RemoteError::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }
}
