//! # Core Module
//!
//! Configuration and the error taxonomy shared by every layer.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Typed `DeployError`/`RemoteError` replace string errors
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::Config;
pub use error::{DeployError, RemoteError};
