//! Settings for one strata invocation.
//!
//! [`Settings`] is a plain value: defaults come from [`Settings::default`],
//! files and the environment are layered on by
//! [`settings_loader`](crate::settings_loader), and command-line flags are
//! applied last by the CLI. Nothing here is global; every engine receives its
//! own copy.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};

/// Default name of the tracking table.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "db_migrations";
/// Default name of the migration lock.
pub const DEFAULT_LOCK_KEY: &str = "mutex_migrations";
/// Default per-migration statement timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default upper bound on the size of a single migration file.
pub const DEFAULT_MAX_MIGRATION_SIZE: u64 = 10 * 1024 * 1024;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(StrataError::ConfigurationError(format!(
                "unknown log format '{other}' (expected 'pretty' or 'json')"
            ))),
        }
    }
}

/// The complete set of settings for one invocation.
///
/// # Examples
///
/// ```
/// use strata_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.migrations_table, "db_migrations");
/// assert_eq!(settings.timeout_secs, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Connection ───────────────────────────────────────────────────

    /// Driver name: `sqlite`, `postgres` (or `postgresql`), `mysql`.
    pub driver: String,
    /// Connection string understood by the driver.
    pub dsn: String,
    /// Directory holding the migration files.
    pub path: String,

    // ── Engine ───────────────────────────────────────────────────────

    /// Per-migration statement timeout in seconds.
    pub timeout_secs: u64,
    /// Name of the tracking table.
    pub migrations_table: String,
    /// Name of the migration lock.
    pub lock_key: String,
    /// Largest migration file, in bytes, the file source accepts.
    pub max_migration_size: u64,

    // ── Logging ──────────────────────────────────────────────────────

    /// `tracing` filter directive, e.g. `info` or `strata_engine=debug`.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver: String::new(),
            dsn: String::new(),
            path: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            lock_key: DEFAULT_LOCK_KEY.to_string(),
            max_migration_size: DEFAULT_MAX_MIGRATION_SIZE,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// The statement timeout as a [`Duration`].
    pub const fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks that the settings describe a runnable invocation.
    pub fn validate(&self) -> StrataResult<()> {
        for (field, value) in [("driver", &self.driver), ("dsn", &self.dsn), ("path", &self.path)] {
            if value.trim().is_empty() {
                return Err(StrataError::ConfigurationError(format!(
                    "'{field}' must be set"
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(StrataError::ConfigurationError(
                "timeout must be at least one second".to_string(),
            ));
        }
        validate_identifier(&self.migrations_table)?;
        if self.lock_key.trim().is_empty() {
            return Err(StrataError::ConfigurationError(
                "lock key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checks that `name` is safe to splice into SQL as a table name.
pub fn validate_identifier(name: &str) -> StrataResult<()> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());
    if re.is_match(name) {
        Ok(())
    } else {
        Err(StrataError::ConfigurationError(format!(
            "'{name}' is not a valid table name"
        )))
    }
}
