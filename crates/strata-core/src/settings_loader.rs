//! Settings loading from configuration files and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML file (overriding defaults).
//! 3. Apply environment variable overrides.
//! 4. Command-line flags, applied by the CLI (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `STRATA_DRIVER` | `driver` |
//! | `STRATA_DSN` | `dsn` |
//! | `STRATA_PATH` | `path` |
//! | `STRATA_TIMEOUT` | `timeout_secs` |
//! | `STRATA_MIGRATIONS_TABLE` | `migrations_table` |
//! | `STRATA_LOCK_KEY` | `lock_key` |
//! | `STRATA_LOG_LEVEL` | `log_level` |
//! | `STRATA_LOG_FORMAT` | `log_format` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use strata_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("strata.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::{StrataError, StrataResult};
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Keys missing from the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> StrataResult<Settings> {
    toml::from_str(toml_str)
        .map_err(|e| StrataError::ConfigurationError(format!("Failed to parse TOML: {e}")))
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> StrataResult<Settings> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        StrataError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> StrataResult<Settings> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> StrataResult<Settings> {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Applies `STRATA_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) -> StrataResult<()> {
    apply_overrides(settings, |key| std::env::var(key).ok())
}

/// Applies overrides from an arbitrary key lookup.
///
/// [`apply_env_overrides`] calls this with `std::env::var`; tests pass a map.
pub fn apply_overrides<F>(settings: &mut Settings, lookup: F) -> StrataResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("STRATA_DRIVER") {
        settings.driver = val;
    }
    if let Some(val) = lookup("STRATA_DSN") {
        settings.dsn = val;
    }
    if let Some(val) = lookup("STRATA_PATH") {
        settings.path = val;
    }
    if let Some(val) = lookup("STRATA_TIMEOUT") {
        settings.timeout_secs = val.trim().parse().map_err(|e| {
            StrataError::ConfigurationError(format!("STRATA_TIMEOUT '{val}' is not a number: {e}"))
        })?;
    }
    if let Some(val) = lookup("STRATA_MIGRATIONS_TABLE") {
        settings.migrations_table = val;
    }
    if let Some(val) = lookup("STRATA_LOCK_KEY") {
        settings.lock_key = val;
    }
    if let Some(val) = lookup("STRATA_LOG_LEVEL") {
        settings.log_level = val;
    }
    if let Some(val) = lookup("STRATA_LOG_FORMAT") {
        settings.log_format = val.parse()?;
    }
    Ok(())
}
