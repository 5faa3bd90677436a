//! # strata-backends
//!
//! Database drivers for strata. Each driver manages the tracking table,
//! executes migration bodies under a timeout, and implements the migration
//! lock with its engine's native primitive.
//!
//! Supported engines:
//! - `SQLite` (feature `sqlite`, on by default)
//! - `PostgreSQL` (feature `postgres`)
//! - `MySQL` (feature `mysql`)
//!
//! The [`memory`] driver is always available and is meant for tests.

pub mod base;
pub mod memory;
pub mod registry;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgresql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use base::{Dialect, Driver};
pub use memory::{MemoryDatabase, MemoryDriver};
pub use registry::{DriverFactory, DriverRegistry};

#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;
