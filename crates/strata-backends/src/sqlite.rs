//! SQLite driver using `rusqlite`.
//!
//! This module provides the [`SqliteDriver`] which implements the
//! [`Driver`](crate::base::Driver) trait using `rusqlite` wrapped in
//! `tokio::task::spawn_blocking` for async compatibility.
//!
//! Features:
//! - WAL mode enabled by default for file-based databases
//! - Migrations and their tracking rows are committed in one transaction
//! - Timeouts abort the running statement through the connection's interrupt handle
//! - The lock is a row in the `db_lock` table, owned by a per-driver holder id

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{params, ErrorCode, OptionalExtension};
use strata_core::{AppliedRecord, Direction, Migration, StrataError, StrataResult};
use tokio::sync::Mutex;

use crate::base::{
    closed_error, now_unix, timeout_error, version_from_sql, version_to_sql, Dialect, Driver,
};
use crate::registry::DriverFactory;

/// Name of the table backing SQLite's migration lock.
pub const LOCK_TABLE: &str = "db_lock";

/// How long a writer waits on SQLite's own file lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite driver.
///
/// Uses `rusqlite` with a `Mutex`-guarded connection. All operations are run
/// via `tokio::task::spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteDriver {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection; `None` once closed.
    conn: Arc<Mutex<Option<rusqlite::Connection>>>,
    /// Aborts the statement currently running on `conn`.
    interrupt: rusqlite::InterruptHandle,
    /// Identifies this driver's rows in the lock table.
    holder: String,
}

impl SqliteDriver {
    /// Opens a SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created. A
    /// `sqlite://` or `sqlite:` prefix on the path is accepted and stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> StrataResult<Self> {
        let path = strip_scheme(path.into());
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| StrataError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StrataError::OperationalError(format!("Failed to set pragmas: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StrataError::OperationalError(format!("Failed to set busy timeout: {e}")))?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                lock_key TEXT NOT NULL PRIMARY KEY, \
                holder TEXT NOT NULL, \
                acquired_at INTEGER NOT NULL\
            )",
            Dialect::Sqlite.quote(LOCK_TABLE)
        ))
        .map_err(|e| StrataError::OperationalError(format!("Failed to create lock table: {e}")))?;

        let interrupt = conn.get_interrupt_handle();
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(Some(conn))),
            interrupt,
            holder: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    pub fn memory() -> StrataResult<Self> {
        Self::open(":memory:")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Runs `f` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> StrataResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            let conn = guard.as_mut().ok_or_else(|| closed_error("sqlite"))?;
            f(conn)
        })
        .await
        .map_err(|e| StrataError::OperationalError(format!("Task join error: {e}")))?
    }

    /// Like [`with_conn`](Self::with_conn), but interrupts the statement if it
    /// runs past `timeout`.
    ///
    /// `f` must claim the [`Deadline`] before committing. If it claimed first,
    /// the deadline is ignored and the commit's own result is returned.
    async fn with_conn_timeout<T, F>(&self, timeout: Duration, f: F) -> StrataResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection, &Deadline) -> StrataResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Deadline::default();
        let task_deadline = deadline.clone();
        let mut task = Box::pin(self.with_conn(move |conn| f(conn, &task_deadline)));

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(result) => result,
            Err(_) if deadline.expire() => {
                self.interrupt.interrupt();
                Err(timeout_error(timeout))
            }
            Err(_) => task.await,
        }
    }
}

const RUNNING: u8 = 0;
const COMMITTING: u8 = 1;
const EXPIRED: u8 = 2;

/// Decides between a commit and a timeout; whichever claims it first wins.
///
/// An interrupt that lands between two statements of a batch is cleared by
/// SQLite, so the blocking side cannot rely on it to stop the commit.
#[derive(Debug, Clone, Default)]
struct Deadline(Arc<AtomicU8>);

impl Deadline {
    /// Claims the right to commit. `false` once the deadline has passed.
    fn claim_commit(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, COMMITTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks the deadline as passed. `false` if a commit already started.
    fn expire(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, EXPIRED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Runs `body` in a transaction and commits it only if `deadline` allows.
/// Dropping the transaction without commit rolls it back.
fn commit_within<F>(
    conn: &mut rusqlite::Connection,
    deadline: &Deadline,
    timeout: Duration,
    body: F,
) -> StrataResult<()>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<()>,
{
    let tx = conn.transaction().map_err(|e| db_error(&e))?;
    body(&tx).map_err(|e| db_error(&e))?;
    if !deadline.claim_commit() {
        return Err(timeout_error(timeout));
    }
    tx.commit().map_err(|e| db_error(&e))
}

fn strip_scheme(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => s
            .strip_prefix("sqlite://")
            .or_else(|| s.strip_prefix("sqlite:"))
            .map_or(path.clone(), PathBuf::from),
        None => path,
    }
}

fn db_error(e: &rusqlite::Error) -> StrataError {
    StrataError::DatabaseError(e.to_string())
}

#[async_trait::async_trait]
impl Driver for SqliteDriver {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    async fn ensure_tracking_table(&self, table: &str) -> StrataResult<()> {
        let sql = Dialect::Sqlite.create_tracking_table(table);
        self.with_conn(move |conn| conn.execute_batch(&sql).map_err(|e| db_error(&e)))
            .await
    }

    async fn applied_records(&self, table: &str) -> StrataResult<Vec<AppliedRecord>> {
        let sql = Dialect::Sqlite.select_applied(table);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(|e| db_error(&e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(|e| db_error(&e))?;

            let mut records = Vec::new();
            for row in rows {
                let (version, name, applied_at) = row.map_err(|e| db_error(&e))?;
                records.push(AppliedRecord::from_unix(
                    version_from_sql(version)?,
                    name,
                    applied_at,
                ));
            }
            Ok(records)
        })
        .await
    }

    async fn execute_migration(&self, statements: &str, timeout: Duration) -> StrataResult<()> {
        if statements.trim().is_empty() {
            return Ok(());
        }
        let statements = statements.to_string();
        self.with_conn_timeout(timeout, move |conn, deadline| {
            commit_within(conn, deadline, timeout, |tx| tx.execute_batch(&statements))
        })
        .await
    }

    async fn record_applied(&self, table: &str, version: u64, name: &str) -> StrataResult<()> {
        let sql = Dialect::Sqlite.insert_applied(table);
        let version = version_to_sql(version)?;
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.execute(&sql, params![version, name, now_unix()])
                .map(|_| ())
                .map_err(|e| db_error(&e))
        })
        .await
    }

    async fn remove_applied(&self, table: &str, version: u64) -> StrataResult<()> {
        let sql = Dialect::Sqlite.delete_applied(table);
        let version = version_to_sql(version)?;
        self.with_conn(move |conn| {
            conn.execute(&sql, params![version])
                .map(|_| ())
                .map_err(|e| db_error(&e))
        })
        .await
    }

    async fn apply_migration(
        &self,
        table: &str,
        migration: &Migration,
        timeout: Duration,
    ) -> StrataResult<()> {
        let record_sql = match migration.direction {
            Direction::Up => Dialect::Sqlite.insert_applied(table),
            Direction::Down => Dialect::Sqlite.delete_applied(table),
        };
        let version = version_to_sql(migration.version)?;
        let migration = migration.clone();

        self.with_conn_timeout(timeout, move |conn, deadline| {
            commit_within(conn, deadline, timeout, |tx| {
                if !migration.is_empty() {
                    tx.execute_batch(&migration.statements)?;
                }
                match migration.direction {
                    Direction::Up => {
                        tx.execute(&record_sql, params![version, migration.name, now_unix()])
                    }
                    Direction::Down => tx.execute(&record_sql, params![version]),
                }
                .map(|_| ())
            })
        })
        .await
    }

    async fn acquire_lock(&self, key: &str) -> StrataResult<()> {
        let sql = format!(
            "INSERT INTO {} (lock_key, holder, acquired_at) VALUES (?, ?, ?)",
            Dialect::Sqlite.quote(LOCK_TABLE)
        );
        let key = key.to_string();
        let holder = self.holder.clone();
        self.with_conn(move |conn| match conn.execute(&sql, params![key, holder, now_unix()]) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StrataError::LockError(format!(
                    "lock '{key}' is already held"
                )))
            }
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked =>
            {
                Err(StrataError::LockError(format!(
                    "database is busy while taking lock '{key}': {}",
                    msg.unwrap_or_default()
                )))
            }
            Err(e) => Err(db_error(&e)),
        })
        .await
    }

    async fn release_lock(&self, key: &str) -> StrataResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE lock_key = ? AND holder = ?",
            Dialect::Sqlite.quote(LOCK_TABLE)
        );
        let key = key.to_string();
        let holder = self.holder.clone();
        self.with_conn(move |conn| {
            conn.execute(&sql, params![key, holder])
                .map(|_| ())
                .map_err(|e| StrataError::LockError(format!("failed to release lock '{key}': {e}")))
        })
        .await
    }

    async fn close(&self) -> StrataResult<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            // Lock rows outlive the connection, unlike session locks.
            let sql = format!(
                "DELETE FROM {} WHERE holder = ?",
                Dialect::Sqlite.quote(LOCK_TABLE)
            );
            if let Err(e) = conn.execute(&sql, params![self.holder]) {
                tracing::warn!(error = %e, "failed to drop lock rows on close");
            }
            conn.close()
                .map_err(|(_, e)| StrataError::OperationalError(format!("SQLite close failed: {e}")))?;
        }
        Ok(())
    }
}

impl SqliteDriver {
    /// Returns the holder id currently owning `key`, if any.
    pub async fn lock_holder(&self, key: &str) -> StrataResult<Option<String>> {
        let sql = format!(
            "SELECT holder FROM {} WHERE lock_key = ?",
            Dialect::Sqlite.quote(LOCK_TABLE)
        );
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(&sql, params![key], |row| row.get::<_, String>(0))
                .optional()
                .map_err(|e| db_error(&e))
        })
        .await
    }

    /// This driver's lock holder id.
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

/// Opens [`SqliteDriver`]s for the driver registry.
pub struct SqliteFactory;

#[async_trait::async_trait]
impl DriverFactory for SqliteFactory {
    async fn open(&self, dsn: &str) -> StrataResult<Box<dyn Driver>> {
        Ok(Box::new(SqliteDriver::open(dsn)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "db_migrations";
    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let driver = SqliteDriver::memory().unwrap();
        assert_eq!(driver.vendor(), "sqlite");
        assert_eq!(driver.path().to_str().unwrap(), ":memory:");
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("sqlite://app.db".into()), PathBuf::from("app.db"));
        assert_eq!(strip_scheme("sqlite::memory:".into()), PathBuf::from(":memory:"));
        assert_eq!(strip_scheme("/tmp/app.db".into()), PathBuf::from("/tmp/app.db"));
    }

    // ── Deadline ────────────────────────────────────────────────────

    #[test]
    fn test_deadline_first_claim_wins() {
        let committing = Deadline::default();
        assert!(committing.claim_commit());
        assert!(!committing.expire());

        let expired = Deadline::default();
        assert!(expired.expire());
        assert!(!expired.claim_commit());
    }

    #[test]
    fn test_expired_deadline_rolls_back() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        let deadline = Deadline::default();
        assert!(deadline.expire());

        let err = commit_within(&mut conn, &deadline, TIMEOUT, |tx| {
            tx.execute_batch("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);")
        })
        .unwrap_err();
        assert!(matches!(err, StrataError::DatabaseError(_)));

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_commit_within_commits_before_deadline() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        commit_within(&mut conn, &Deadline::default(), TIMEOUT, |tx| {
            tx.execute_batch("INSERT INTO t VALUES (1)")
        })
        .unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    // ── Driver ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_tracking_table_starts_empty() {
        let driver = SqliteDriver::memory().unwrap();
        driver.ensure_tracking_table(TABLE).await.unwrap();
        // Idempotent.
        driver.ensure_tracking_table(TABLE).await.unwrap();
        assert!(driver.applied_records(TABLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_remove() {
        let driver = SqliteDriver::memory().unwrap();
        driver.ensure_tracking_table(TABLE).await.unwrap();
        driver.record_applied(TABLE, 2, "second").await.unwrap();
        driver.record_applied(TABLE, 1, "first").await.unwrap();

        let records = driver.applied_records(TABLE).await.unwrap();
        let versions: Vec<u64> = records.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(records[0].name, "first");

        driver.remove_applied(TABLE, 2).await.unwrap();
        assert_eq!(driver.applied_records(TABLE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_migration_up_and_down() {
        let driver = SqliteDriver::memory().unwrap();
        driver.ensure_tracking_table(TABLE).await.unwrap();

        let up = Migration::up(1, "create_users", "CREATE TABLE users (id INTEGER PRIMARY KEY);");
        driver.apply_migration(TABLE, &up, TIMEOUT).await.unwrap();
        let records = driver.applied_records(TABLE).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "create_users");

        let down = Migration::down(1, "create_users", "DROP TABLE users;");
        driver.apply_migration(TABLE, &down, TIMEOUT).await.unwrap();
        assert!(driver.applied_records(TABLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_migration_rolls_back() {
        let driver = SqliteDriver::memory().unwrap();
        driver.ensure_tracking_table(TABLE).await.unwrap();

        let bad = Migration::up(
            1,
            "half_done",
            "CREATE TABLE a (id INTEGER); CREATE TABLE oops (;",
        );
        let err = driver.apply_migration(TABLE, &bad, TIMEOUT).await.unwrap_err();
        assert!(err.is_database_error());
        assert!(driver.applied_records(TABLE).await.unwrap().is_empty());

        // Table `a` was rolled back together with the failing statement.
        let ok = Migration::up(1, "again", "CREATE TABLE a (id INTEGER);");
        driver.apply_migration(TABLE, &ok, TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_migration_error() {
        let driver = SqliteDriver::memory().unwrap();
        let err = driver
            .execute_migration("SELECT * FROM missing_table", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_execute_empty_migration() {
        let driver = SqliteDriver::memory().unwrap();
        assert!(driver.execute_migration("   ", TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let driver = SqliteDriver::memory().unwrap();
        driver.acquire_lock("mutex_migrations").await.unwrap();
        assert_eq!(
            driver.lock_holder("mutex_migrations").await.unwrap().as_deref(),
            Some(driver.holder())
        );

        let err = driver.acquire_lock("mutex_migrations").await.unwrap_err();
        assert!(matches!(err, StrataError::LockError(_)));

        driver.release_lock("mutex_migrations").await.unwrap();
        assert!(driver.lock_holder("mutex_migrations").await.unwrap().is_none());
        driver.acquire_lock("mutex_migrations").await.unwrap();
    }

    #[tokio::test]
    async fn test_release_unheld_lock_is_noop() {
        let driver = SqliteDriver::memory().unwrap();
        assert!(driver.release_lock("never_taken").await.is_ok());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let driver = SqliteDriver::memory().unwrap();
        driver.close().await.unwrap();
        driver.close().await.unwrap();
        let err = driver.ensure_tracking_table(TABLE).await.unwrap_err();
        assert!(matches!(err, StrataError::OperationalError(_)));
    }
}
