//! # Command Definitions
//!
//! Loading, classifying and diffing application command definitions.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: `CommandSource` supplier trait replaces direct directory loading
//! - 1.0.0: Initial loader, classifier and differ

pub mod classifier;
pub mod definition;
pub mod differ;
pub mod equality;
pub mod loader;
pub mod source;

pub use classifier::{classify, Classified, DuplicatePolicy};
pub use definition::{is_snowflake, CommandDefinition, GuildTarget, RawDefinition, RemoteCommand};
pub use differ::ReconciliationPlan;
pub use equality::deep_equal;
pub use loader::{DirectoryLoader, DEFAULT_FILE_EXTENSION};
pub use source::{CommandSource, LoadOutcome, StaticSource};
