//! The migration engine.
//!
//! An [`Engine`] owns one [`Driver`] and a validated [`MigrationSet`]. Every
//! apply operation follows the same sequence:
//!
//! 1. take the lock (fail fast with a lock error if someone else holds it)
//! 2. re-read the tracking table and check it against the catalog
//! 3. compute the work list for the requested direction and limit
//! 4. run each migration in order, stopping at the first failure or at
//!    cancellation, and record or remove its tracking row
//! 5. release the lock, whatever happened above
//!
//! The count returned (or carried by [`ApplyError`]) is always the number of
//! migrations that were executed and recorded in this call.

use std::time::Instant;

use strata_backends::Driver;
use strata_core::logging::engine_span;
use strata_core::{
    AppliedRecord, ApplyError, Direction, Migration, MigrationSet, StrataError, StrataResult,
};
use strata_sources::Source;
use tracing::Instrument;

use crate::config::{EngineConfig, ZeroLimit};
use crate::lock::with_lock;
use crate::plan::{self, DownLimit, MigrationStatus};

/// Applies migrations from a source to a database.
///
/// # Examples
///
/// ```
/// use strata_backends::{MemoryDatabase, MemoryDriver};
/// use strata_engine::{Engine, EngineConfig};
/// use strata_sources::EmbeddedSource;
///
/// static FILES: &[(&str, &str)] = &[
///     ("1_users.up.sql", "CREATE TABLE users (id INTEGER);"),
///     ("1_users.down.sql", "DROP TABLE users;"),
/// ];
///
/// # tokio_test::block_on(async {
/// let driver = MemoryDriver::new(MemoryDatabase::new());
/// let mut engine = Engine::new(
///     Box::new(driver),
///     &EmbeddedSource::new(FILES),
///     EngineConfig::new(),
/// )
/// .await
/// .unwrap();
///
/// assert_eq!(engine.apply(0).await.unwrap(), 1);
/// assert_eq!(engine.apply(0).await.unwrap(), 0);
/// engine.close().await.unwrap();
/// # });
/// ```
pub struct Engine {
    driver: Option<Box<dyn Driver>>,
    migrations: MigrationSet,
    config: EngineConfig,
    span: tracing::Span,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("driver", &self.driver.as_ref().map(|d| d.vendor().to_string()))
            .field("migrations", &self.migrations.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Builds an engine.
    ///
    /// Validates `config`, loads the catalog from `source`, creates the
    /// tracking table if needed, and checks that the applied migrations form
    /// a prefix of the catalog. The driver is closed if any step fails.
    ///
    /// # Errors
    ///
    /// [`StrataError::ConfigurationError`] for invalid configuration, an
    /// unreadable or inconsistent source, or a gap between the applied set
    /// and the catalog. Driver failures are passed through.
    pub async fn new(
        driver: Box<dyn Driver>,
        source: &dyn Source,
        config: EngineConfig,
    ) -> StrataResult<Self> {
        let span = engine_span(driver.vendor(), &config.lock_key);
        match Self::load(driver.as_ref(), source, &config)
            .instrument(span.clone())
            .await
        {
            Ok(migrations) => Ok(Self {
                driver: Some(driver),
                migrations,
                config,
                span,
            }),
            Err(e) => {
                if let Err(close_err) = driver.close().await {
                    tracing::warn!(error = %close_err, "failed to close driver after load error");
                }
                Err(e)
            }
        }
    }

    async fn load(
        driver: &dyn Driver,
        source: &dyn Source,
        config: &EngineConfig,
    ) -> StrataResult<MigrationSet> {
        config.validate()?;
        let migrations = source.migrations()?;
        tracing::debug!(
            source = source.name(),
            migrations = migrations.len(),
            "loaded migration catalog"
        );

        driver.ensure_tracking_table(&config.migrations_table).await?;
        let applied = driver.applied_records(&config.migrations_table).await?;
        plan::check_prefix(&migrations, &applied)?;
        Ok(migrations)
    }

    /// The catalog loaded at construction.
    pub const fn migrations(&self) -> &MigrationSet {
        &self.migrations
    }

    /// The configuration this engine runs with.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub const fn is_closed(&self) -> bool {
        self.driver.is_none()
    }

    fn driver(&self) -> StrataResult<&dyn Driver> {
        self.driver
            .as_deref()
            .ok_or_else(|| StrataError::OperationalError("engine is closed".to_string()))
    }

    /// Applies every pending forward migration.
    pub async fn apply_all(&mut self) -> Result<(), ApplyError> {
        self.apply(0).await.map(|_| ())
    }

    /// Applies up to `limit` pending forward migrations in ascending version
    /// order. A limit of `0` applies all of them.
    ///
    /// Returns the number applied, which is less than `limit` when fewer are
    /// pending.
    pub async fn apply(&mut self, limit: usize) -> Result<usize, ApplyError> {
        self.run(Direction::Up, |set, applied| {
            Ok(plan::plan_up(set, applied, limit))
        })
        .await
    }

    /// Reverts up to `limit` applied migrations, most recent first.
    ///
    /// A limit of `0` follows [`EngineConfig::down_zero_limit`]. Fails with a
    /// configuration error, before running anything, if a selected migration
    /// has no backward counterpart.
    pub async fn apply_down(&mut self, limit: usize) -> Result<usize, ApplyError> {
        let limit = match (limit, self.config.down_zero_limit) {
            (0, ZeroLimit::All) => DownLimit::All,
            (n, _) => DownLimit::Count(n),
        };
        self.run(Direction::Down, |set, applied| {
            plan::plan_down(set, applied, limit)
        })
        .await
    }

    /// Reverts every applied migration.
    pub async fn revert_all(&mut self) -> Result<usize, ApplyError> {
        self.run(Direction::Down, |set, applied| {
            plan::plan_down(set, applied, DownLimit::All)
        })
        .await
    }

    /// Lists every migration in the catalog with its applied state.
    ///
    /// The tracking table is read while holding the lock.
    pub async fn status(&mut self) -> StrataResult<Vec<MigrationStatus>> {
        let driver = self.driver()?;
        let config = &self.config;
        let migrations = &self.migrations;

        let body = async {
            let applied = driver
                .applied_records(&config.migrations_table)
                .await
                .map_err(|e| ApplyError::new(0, e))?;
            Ok(plan::status(migrations, &applied))
        };
        with_lock(
            driver,
            &config.lock_key,
            &config.cancellation,
            config.reporter.as_ref(),
            body,
        )
        .instrument(self.span.clone())
        .await
        .map_err(|e| e.source)
    }

    /// Runs one apply sequence. `select` turns the catalog and the freshly
    /// read applied records into the work list.
    async fn run<P>(&mut self, direction: Direction, select: P) -> Result<usize, ApplyError>
    where
        P: FnOnce(&MigrationSet, &[AppliedRecord]) -> StrataResult<Vec<Migration>> + Send,
    {
        let driver = self.driver()?;
        let config = &self.config;
        let migrations = &self.migrations;

        let body = async {
            let applied = driver
                .applied_records(&config.migrations_table)
                .await
                .map_err(|e| ApplyError::new(0, e))?;
            plan::check_prefix(migrations, &applied).map_err(|e| ApplyError::new(0, e))?;
            let work = select(migrations, &applied).map_err(|e| ApplyError::new(0, e))?;

            tracing::info!(%direction, pending = work.len(), "computed work list");
            let applied = execute(driver, config, &work).await?;
            config.reporter.finished(direction, applied);
            Ok(applied)
        };

        with_lock(
            driver,
            &config.lock_key,
            &config.cancellation,
            config.reporter.as_ref(),
            body,
        )
        .instrument(self.span.clone())
        .await
    }

    /// Releases the driver. Later operations fail with an operational error;
    /// closing twice is a no-op.
    ///
    /// Session-scoped locks die with the connection, so nothing outlives this.
    pub async fn close(&mut self) -> StrataResult<()> {
        match self.driver.take() {
            Some(driver) => {
                let result = driver.close().await;
                tracing::debug!(parent: &self.span, "engine closed");
                result
            }
            None => Ok(()),
        }
    }
}

/// Runs `work` in order, stopping at the first failure or at cancellation.
async fn execute(
    driver: &dyn Driver,
    config: &EngineConfig,
    work: &[Migration],
) -> Result<usize, ApplyError> {
    let mut applied = 0;
    for migration in work {
        if config.cancellation.is_cancelled() {
            tracing::warn!(applied, remaining = work.len() - applied, "apply sequence cancelled");
            return Err(ApplyError::new(
                applied,
                StrataError::Cancelled(format!(
                    "cancelled before migration {migration}; {applied} of {} applied",
                    work.len()
                )),
            ));
        }

        config.reporter.migration_started(migration);
        let started = Instant::now();
        if let Err(e) = driver
            .apply_migration(&config.migrations_table, migration, config.statement_timeout)
            .await
        {
            config.reporter.migration_failed(migration, &e);
            let e = match e {
                e @ StrataError::ConfigurationError(_) => return Err(ApplyError::new(applied, e)),
                e @ (StrataError::DatabaseError(_) | StrataError::MigrationFailed { .. }) => e,
                other => StrataError::DatabaseError(other.to_string()),
            };
            return Err(ApplyError::new(
                applied,
                StrataError::migration_failed(
                    migration.version,
                    &migration.name,
                    migration.direction,
                    e,
                ),
            ));
        }
        config.reporter.migration_applied(migration, started.elapsed());
        applied += 1;
    }
    Ok(applied)
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.driver.is_some() {
            tracing::debug!(parent: &self.span, "engine dropped without close");
        }
    }
}
