//! # strata-engine
//!
//! The migration engine: reconciles a source's catalog against a database's
//! tracking table, takes the migration lock, and applies migrations in order
//! with halt-on-first-failure semantics.
//!
//! ## Modules
//!
//! - [`engine`] - The [`Engine`] and its apply operations
//! - [`config`] - [`EngineConfig`] and the zero-limit policy for reverts
//! - [`plan`] - Prefix checking and work-list computation
//! - [`lock`] - Lock acquisition and guaranteed release
//! - [`reporter`] - Progress reporting
//! - [`apply`] - Settings-driven one-shot operations

pub mod apply;
pub mod config;
pub mod engine;
pub mod lock;
pub mod plan;
pub mod reporter;

pub use config::{EngineConfig, ZeroLimit};
pub use engine::Engine;
pub use plan::{DownLimit, MigrationStatus};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use tokio_util::sync::CancellationToken;
