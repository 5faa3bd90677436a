//! One-shot entry points driven by [`Settings`].
//!
//! Each function opens the configured driver, reads migrations from the
//! directory in `settings.path`, builds an [`Engine`], runs one operation,
//! and closes the engine again whether or not the operation succeeded.

use strata_backends::DriverRegistry;
use strata_core::{ApplyError, Settings, StrataResult};
use strata_sources::FileSource;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::plan::MigrationStatus;

/// Builds an engine from `settings`, opening the driver through `registry`.
///
/// `config` supplies the cancellation token and reporter; its table name, lock
/// key, and timeout are replaced by the values in `settings`.
pub async fn initialize_engine(
    settings: &Settings,
    registry: &DriverRegistry,
    config: EngineConfig,
) -> StrataResult<Engine> {
    settings.validate()?;
    let source = FileSource::open(&settings.path)?.with_max_size(settings.max_migration_size);
    let driver = registry.open(&settings.driver, &settings.dsn).await?;

    let config = config
        .with_migrations_table(&settings.migrations_table)
        .with_lock_key(&settings.lock_key)
        .with_statement_timeout(settings.statement_timeout());
    Engine::new(driver, &source, config).await
}

async fn close(mut engine: Engine) {
    if let Err(e) = engine.close().await {
        tracing::warn!(error = %e, "failed to close engine");
    }
}

async fn builtin_engine(settings: &Settings, cancel: CancellationToken) -> StrataResult<Engine> {
    let config = EngineConfig::new().with_cancellation(cancel);
    initialize_engine(settings, &DriverRegistry::with_builtin_drivers(), config).await
}

/// Applies every pending migration.
pub async fn migrate(settings: &Settings, cancel: CancellationToken) -> Result<(), ApplyError> {
    let mut engine = builtin_engine(settings, cancel).await?;
    let result = engine.apply_all().await;
    close(engine).await;
    result
}

/// Applies up to `limit` pending migrations (`0` applies all).
pub async fn up(
    settings: &Settings,
    limit: usize,
    cancel: CancellationToken,
) -> Result<usize, ApplyError> {
    let mut engine = builtin_engine(settings, cancel).await?;
    let result = engine.apply(limit).await;
    close(engine).await;
    result
}

/// Reverts up to `limit` applied migrations (`0` reverts none).
pub async fn down(
    settings: &Settings,
    limit: usize,
    cancel: CancellationToken,
) -> Result<usize, ApplyError> {
    let mut engine = builtin_engine(settings, cancel).await?;
    let result = engine.apply_down(limit).await;
    close(engine).await;
    result
}

/// Reverts every applied migration.
pub async fn down_all(settings: &Settings, cancel: CancellationToken) -> Result<usize, ApplyError> {
    let mut engine = builtin_engine(settings, cancel).await?;
    let result = engine.revert_all().await;
    close(engine).await;
    result
}

/// Lists every migration with its applied state.
pub async fn status(
    settings: &Settings,
    cancel: CancellationToken,
) -> StrataResult<Vec<MigrationStatus>> {
    let mut engine = builtin_engine(settings, cancel).await?;
    let result = engine.status().await;
    close(engine).await;
    result
}
