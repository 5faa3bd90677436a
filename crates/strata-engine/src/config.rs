//! Engine configuration.
//!
//! [`EngineConfig`] is a plain value built with consuming `with_*` setters and
//! checked once, by [`Engine::new`](crate::Engine::new). Each engine owns its
//! configuration, including its reporter and cancellation token, so engines
//! never share hidden state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use strata_core::settings::{
    validate_identifier, DEFAULT_LOCK_KEY, DEFAULT_MIGRATIONS_TABLE, DEFAULT_TIMEOUT_SECS,
};
use strata_core::{Settings, StrataError, StrataResult};
use tokio_util::sync::CancellationToken;

use crate::reporter::{Reporter, TracingReporter};

/// What a revert with a limit of zero does.
///
/// Forward application always treats zero as "everything pending". For
/// reverts the meaning is a choice, so it is spelled out here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroLimit {
    /// `apply_down(0)` reverts nothing.
    #[default]
    Nothing,
    /// `apply_down(0)` reverts every applied migration.
    All,
}

/// The complete configuration for one [`Engine`](crate::Engine).
#[derive(Clone)]
pub struct EngineConfig {
    /// Name of the tracking table.
    pub migrations_table: String,
    /// Name of the migration lock.
    pub lock_key: String,
    /// Upper bound on the run time of each migration.
    pub statement_timeout: Duration,
    /// Fired to stop an apply sequence between migrations.
    pub cancellation: CancellationToken,
    /// Receives progress events.
    pub reporter: Arc<dyn Reporter>,
    /// Meaning of `apply_down(0)`.
    pub down_zero_limit: ZeroLimit,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            lock_key: DEFAULT_LOCK_KEY.to_string(),
            statement_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cancellation: CancellationToken::new(),
            reporter: Arc::new(TracingReporter),
            down_zero_limit: ZeroLimit::default(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("migrations_table", &self.migrations_table)
            .field("lock_key", &self.lock_key)
            .field("statement_timeout", &self.statement_timeout)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("down_zero_limit", &self.down_zero_limit)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the table name, lock key, and timeout from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::default()
            .with_migrations_table(&settings.migrations_table)
            .with_lock_key(&settings.lock_key)
            .with_statement_timeout(settings.statement_timeout())
    }

    #[must_use]
    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    #[must_use]
    pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = key.into();
        self
    }

    #[must_use]
    pub const fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub const fn with_down_zero_limit(mut self, zero: ZeroLimit) -> Self {
        self.down_zero_limit = zero;
        self
    }

    /// Checks that the configuration can drive an engine.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::ConfigurationError`] for an invalid table name,
    /// an empty lock key, or a zero timeout.
    pub fn validate(&self) -> StrataResult<()> {
        validate_identifier(&self.migrations_table)?;
        if self.lock_key.trim().is_empty() {
            return Err(StrataError::ConfigurationError(
                "lock key must not be empty".to_string(),
            ));
        }
        if self.statement_timeout.is_zero() {
            return Err(StrataError::ConfigurationError(
                "statement timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.migrations_table, "db_migrations");
        assert_eq!(config.lock_key, "mutex_migrations");
        assert_eq!(config.statement_timeout, Duration::from_secs(60));
        assert_eq!(config.down_zero_limit, ZeroLimit::Nothing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let token = CancellationToken::new();
        let config = EngineConfig::new()
            .with_migrations_table("schema_versions")
            .with_lock_key("deploy")
            .with_statement_timeout(Duration::from_secs(5))
            .with_cancellation(token.clone())
            .with_down_zero_limit(ZeroLimit::All);

        assert_eq!(config.migrations_table, "schema_versions");
        assert_eq!(config.lock_key, "deploy");
        assert_eq!(config.down_zero_limit, ZeroLimit::All);
        token.cancel();
        assert!(config.cancellation.is_cancelled());
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            timeout_secs: 7,
            migrations_table: "versions".into(),
            ..Settings::default()
        };
        let config = EngineConfig::from_settings(&settings);
        assert_eq!(config.statement_timeout, Duration::from_secs(7));
        assert_eq!(config.migrations_table, "versions");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EngineConfig::new()
            .with_migrations_table("drop table")
            .validate()
            .is_err());
        assert!(EngineConfig::new().with_lock_key("").validate().is_err());
        assert!(EngineConfig::new()
            .with_statement_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_debug_omits_reporter() {
        let rendered = format!("{:?}", EngineConfig::new());
        assert!(rendered.contains("db_migrations"));
        assert!(rendered.contains(".."));
    }
}
