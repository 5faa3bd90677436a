//! # strata-core
//!
//! Core types, settings, and error types for strata. This crate has no
//! database dependencies and provides the foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and result aliases
//! - [`migration`] - `Migration`, `AppliedRecord`, and the validated `MigrationSet`
//! - [`settings`] - Per-invocation settings with defaults and validation
//! - [`settings_loader`] - TOML and environment variable loading
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod migration;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ApplyError, ErrorKind, StrataError, StrataResult};
pub use migration::{AppliedRecord, Direction, Migration, MigrationSet};
pub use settings::{LogFormat, Settings};
