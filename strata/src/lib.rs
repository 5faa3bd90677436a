//! # strata
//!
//! Ordered, locked, resumable SQL schema migrations.
//!
//! This is the meta-crate that re-exports the strata sub-crates. Depend on
//! `strata` to embed the engine in an application, or on the individual
//! crates for finer-grained control. The `strata` binary lives in
//! `strata-cli`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata::prelude::*;
//!
//! # async fn run() -> Result<(), ApplyError> {
//! let settings = Settings {
//!     driver: "sqlite".into(),
//!     dsn: "app.db".into(),
//!     path: "migrations".into(),
//!     ..Settings::default()
//! };
//! strata::engine::apply::migrate(&settings, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

/// Error types, migration model, settings, and logging.
pub use strata_core as core;

/// Database drivers: `PostgreSQL`, `MySQL`, `SQLite`, and the in-memory test driver.
pub use strata_backends as backends;

/// Migration sources: directories on disk and embedded bundles.
pub use strata_sources as sources;

/// The migration engine, locking, and settings-driven operations.
pub use strata_engine as engine;

pub use async_trait::async_trait;
pub use tokio;

/// Commonly used items.
pub mod prelude {
    pub use strata_backends::{Driver, DriverRegistry};
    pub use strata_core::{
        ApplyError, Direction, ErrorKind, Migration, MigrationSet, Settings, StrataError,
        StrataResult,
    };
    pub use strata_engine::{
        CancellationToken, DownLimit, Engine, EngineConfig, MigrationStatus, Reporter, ZeroLimit,
    };
    pub use strata_sources::{EmbeddedSource, FileSource, Source};
}
