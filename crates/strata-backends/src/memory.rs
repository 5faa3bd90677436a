//! An in-process driver for tests and dry runs.
//!
//! [`MemoryDatabase`] is a shared, cloneable "database" holding tracking
//! tables, named locks, and a log of every executed migration body. Each
//! [`MemoryDriver`] is one session against it, so two drivers over the same
//! database contend for locks the way two processes would.
//!
//! Failures can be scripted: a body containing a configured marker fails with
//! a database error (or panics), and every execution can be slowed down to
//! exercise timeouts and cancellation.
//!
//! # Example
//!
//! ```
//! use strata_backends::memory::{MemoryDatabase, MemoryDriver};
//!
//! let db = MemoryDatabase::new();
//! db.fail_on("BROKEN");
//! let driver = MemoryDriver::new(db.clone());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use strata_core::{AppliedRecord, StrataError, StrataResult};

use crate::base::{closed_error, now_unix, timeout_error, Driver};

#[derive(Debug, Default)]
struct State {
    /// Tracking tables: version -> (name, applied_at).
    tables: HashMap<String, BTreeMap<u64, (String, i64)>>,
    /// Named locks: key -> session id.
    locks: HashMap<String, u64>,
    /// Every successfully executed migration body, in order.
    executed: Vec<String>,
    fail_marker: Option<String>,
    panic_marker: Option<String>,
    delay: Duration,
    fail_release: bool,
}

/// A shared in-memory database.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
    next_session: Arc<AtomicU64>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A scripted panic must not wedge every later test assertion.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every migration body containing `marker` fail with a database error.
    pub fn fail_on(&self, marker: impl Into<String>) {
        self.state().fail_marker = Some(marker.into());
    }

    /// Makes every migration body containing `marker` panic.
    pub fn panic_on(&self, marker: impl Into<String>) {
        self.state().panic_marker = Some(marker.into());
    }

    /// Sleeps for `delay` before executing each migration body.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Makes lock release fail while `fail` is set.
    pub fn fail_release(&self, fail: bool) {
        self.state().fail_release = fail;
    }

    /// Removes every scripted failure and delay.
    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.fail_marker = None;
        state.panic_marker = None;
        state.delay = Duration::ZERO;
        state.fail_release = false;
    }

    /// Migration bodies executed so far, oldest first.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Versions recorded in `table`, ascending.
    pub fn applied_versions(&self, table: &str) -> Vec<u64> {
        self.state()
            .tables
            .get(table)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Writes a tracking row directly, bypassing any migration.
    pub fn insert_record(&self, table: &str, version: u64, name: &str) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(version, (name.to_string(), now_unix()));
    }

    /// Returns `true` if some session holds `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.state().locks.contains_key(key)
    }

    fn new_session(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}

/// One session against a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryDriver {
    db: MemoryDatabase,
    session: u64,
    closed: AtomicBool,
}

impl MemoryDriver {
    /// Opens a new session against `db`.
    pub fn new(db: MemoryDatabase) -> Self {
        let session = db.new_session();
        Self {
            db,
            session,
            closed: AtomicBool::new(false),
        }
    }

    /// The database this session talks to.
    pub const fn database(&self) -> &MemoryDatabase {
        &self.db
    }

    fn ensure_open(&self) -> StrataResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(closed_error("memory"))
        } else {
            Ok(())
        }
    }

    fn table_missing(table: &str) -> StrataError {
        StrataError::DatabaseError(format!("no such table: {table}"))
    }
}

#[async_trait::async_trait]
impl Driver for MemoryDriver {
    fn vendor(&self) -> &str {
        "memory"
    }

    async fn ensure_tracking_table(&self, table: &str) -> StrataResult<()> {
        self.ensure_open()?;
        self.db.state().tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn applied_records(&self, table: &str) -> StrataResult<Vec<AppliedRecord>> {
        self.ensure_open()?;
        let state = self.db.state();
        let rows = state.tables.get(table).ok_or_else(|| Self::table_missing(table))?;
        Ok(rows
            .iter()
            .map(|(version, (name, applied_at))| {
                AppliedRecord::from_unix(*version, name.clone(), *applied_at)
            })
            .collect())
    }

    async fn execute_migration(&self, statements: &str, timeout: Duration) -> StrataResult<()> {
        self.ensure_open()?;
        let (delay, fail, panic) = {
            let state = self.db.state();
            let hit = |marker: &Option<String>| {
                marker.as_deref().is_some_and(|m| statements.contains(m))
            };
            (state.delay, hit(&state.fail_marker), hit(&state.panic_marker))
        };

        if !delay.is_zero() {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(timeout_error(timeout));
            }
            tokio::time::sleep(delay).await;
        }
        if panic {
            panic!("scripted panic while executing migration");
        }
        if fail {
            return Err(StrataError::DatabaseError(format!(
                "scripted failure executing: {}",
                statements.trim()
            )));
        }
        self.db.state().executed.push(statements.to_string());
        Ok(())
    }

    async fn record_applied(&self, table: &str, version: u64, name: &str) -> StrataResult<()> {
        self.ensure_open()?;
        let mut state = self.db.state();
        let rows = state
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::table_missing(table))?;
        if rows.contains_key(&version) {
            return Err(StrataError::DatabaseError(format!(
                "duplicate key: version {version} is already recorded"
            )));
        }
        rows.insert(version, (name.to_string(), now_unix()));
        Ok(())
    }

    async fn remove_applied(&self, table: &str, version: u64) -> StrataResult<()> {
        self.ensure_open()?;
        let mut state = self.db.state();
        state
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::table_missing(table))?
            .remove(&version);
        Ok(())
    }

    async fn acquire_lock(&self, key: &str) -> StrataResult<()> {
        self.ensure_open()?;
        let mut state = self.db.state();
        match state.locks.get(key) {
            Some(_) => Err(StrataError::LockError(format!(
                "lock '{key}' is already held"
            ))),
            None => {
                state.locks.insert(key.to_string(), self.session);
                Ok(())
            }
        }
    }

    async fn release_lock(&self, key: &str) -> StrataResult<()> {
        let mut state = self.db.state();
        if state.fail_release {
            return Err(StrataError::LockError(format!(
                "scripted failure releasing lock '{key}'"
            )));
        }
        if state.locks.get(key) == Some(&self.session) {
            state.locks.remove(key);
        }
        Ok(())
    }

    async fn close(&self) -> StrataResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Session locks die with the session.
            let session = self.session;
            self.db.state().locks.retain(|_, holder| *holder != session);
        }
        Ok(())
    }
}
