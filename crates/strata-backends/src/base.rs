//! Base driver trait and shared SQL helpers.
//!
//! This module defines the [`Driver`] trait that every database engine
//! implements, along with the [`Dialect`] enum that renders the handful of
//! tracking-table statements the drivers need.

use std::time::Duration;

use strata_core::{AppliedRecord, Direction, Migration, StrataError, StrataResult};

/// The core trait for database drivers.
///
/// Each database engine (PostgreSQL, SQLite, MySQL) implements this trait to
/// provide a uniform interface for managing the tracking table, executing
/// migration bodies, and taking the migration lock.
///
/// All methods are async because database operations are inherently I/O-bound.
/// Drivers built on synchronous clients (like `rusqlite`) wrap operations in
/// `spawn_blocking` to maintain the async interface.
///
/// A driver owns exactly one connection for its whole lifetime: session-scoped
/// lock primitives are only released by the session that took them.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Returns the vendor name (e.g., "postgresql", "sqlite", "mysql").
    fn vendor(&self) -> &str;

    /// Creates the tracking table if it does not exist yet.
    async fn ensure_tracking_table(&self, table: &str) -> StrataResult<()>;

    /// Reads every row of the tracking table, ascending by version.
    async fn applied_records(&self, table: &str) -> StrataResult<Vec<AppliedRecord>>;

    /// Executes a migration body, failing with
    /// [`StrataError::DatabaseError`] if it errors or runs past `timeout`.
    async fn execute_migration(&self, statements: &str, timeout: Duration) -> StrataResult<()>;

    /// Inserts the tracking row for an applied forward migration.
    async fn record_applied(&self, table: &str, version: u64, name: &str) -> StrataResult<()>;

    /// Deletes the tracking row for a reverted migration.
    async fn remove_applied(&self, table: &str, version: u64) -> StrataResult<()>;

    /// Executes `migration` and updates the tracking table to match.
    ///
    /// The default runs [`execute_migration`](Self::execute_migration) followed
    /// by [`record_applied`](Self::record_applied) or
    /// [`remove_applied`](Self::remove_applied). Drivers whose engine supports
    /// transactional DDL override this to do both in one transaction.
    async fn apply_migration(
        &self,
        table: &str,
        migration: &Migration,
        timeout: Duration,
    ) -> StrataResult<()> {
        self.execute_migration(&migration.statements, timeout).await?;
        match migration.direction {
            Direction::Up => {
                self.record_applied(table, migration.version, &migration.name)
                    .await
            }
            Direction::Down => self.remove_applied(table, migration.version).await,
        }
    }

    /// Takes the named lock, failing fast with [`StrataError::LockError`] if
    /// another holder has it.
    async fn acquire_lock(&self, key: &str) -> StrataResult<()>;

    /// Releases the named lock. Releasing a lock this driver does not hold is
    /// a no-op.
    async fn release_lock(&self, key: &str) -> StrataResult<()>;

    /// Closes the underlying connection. Further calls fail with
    /// [`StrataError::OperationalError`]; closing twice is a no-op.
    async fn close(&self) -> StrataResult<()>;
}

/// The SQL dialects strata renders tracking-table statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// SQLite: double-quoted identifiers, `?` placeholders.
    Sqlite,
    /// PostgreSQL: double-quoted identifiers, `$n` placeholders.
    Postgres,
    /// MySQL: backtick-quoted identifiers, `?` placeholders.
    MySql,
}

impl Dialect {
    /// Quotes an identifier for this dialect.
    ///
    /// Callers validate identifiers up front; quoting only guards against
    /// reserved words.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::Sqlite | Self::MySql => "?".to_string(),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for the tracking table.
    pub fn create_tracking_table(self, table: &str) -> String {
        let (version, name) = match self {
            Self::Sqlite => ("INTEGER", "TEXT"),
            Self::Postgres | Self::MySql => ("BIGINT", "VARCHAR(255)"),
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                version {version} NOT NULL PRIMARY KEY, \
                name {name} NOT NULL, \
                applied_at BIGINT NOT NULL\
            )",
            self.quote(table)
        )
    }

    /// Selects every tracking row, ascending by version.
    pub fn select_applied(self, table: &str) -> String {
        format!(
            "SELECT version, name, applied_at FROM {} ORDER BY version ASC",
            self.quote(table)
        )
    }

    /// Inserts one tracking row: `(version, name, applied_at)`.
    pub fn insert_applied(self, table: &str) -> String {
        format!(
            "INSERT INTO {} (version, name, applied_at) VALUES ({}, {}, {})",
            self.quote(table),
            self.placeholder(1),
            self.placeholder(2),
            self.placeholder(3)
        )
    }

    /// Deletes one tracking row by version.
    pub fn delete_applied(self, table: &str) -> String {
        format!(
            "DELETE FROM {} WHERE version = {}",
            self.quote(table),
            self.placeholder(1)
        )
    }
}

/// Converts a migration version to the signed 64-bit value stored in the database.
pub fn version_to_sql(version: u64) -> StrataResult<i64> {
    i64::try_from(version).map_err(|_| {
        StrataError::ConfigurationError(format!(
            "migration version {version} does not fit in a BIGINT column"
        ))
    })
}

/// Converts a stored version back to a migration version.
pub fn version_from_sql(version: i64) -> StrataResult<u64> {
    u64::try_from(version).map_err(|_| {
        StrataError::DatabaseError(format!("tracking table holds negative version {version}"))
    })
}

/// Current time as stored in `applied_at`.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Derives a stable 64-bit lock id from a lock key (FNV-1a).
///
/// Engines whose lock primitive is keyed by integer (PostgreSQL advisory
/// locks) use this so that every process maps a key to the same id.
pub fn lock_id(key: &str) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = key
        .bytes()
        .fold(OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(PRIME));
    i64::from_ne_bytes(hash.to_ne_bytes())
}

/// Error returned when an operation is attempted on a closed driver.
pub fn closed_error(vendor: &str) -> StrataError {
    StrataError::OperationalError(format!("{vendor} connection is closed"))
}

/// Error returned when a migration body runs past its timeout.
pub fn timeout_error(timeout: Duration) -> StrataError {
    StrataError::DatabaseError(format!(
        "migration timed out after {}s",
        timeout.as_secs_f64()
    ))
}
