//! The [`Source`] trait and migration file-name parsing.
//!
//! Every source stores migrations as named files:
//!
//! ```text
//! <version>_<name>.<up|down>.sql
//! 000001_create_users.up.sql
//! 000001_create_users.down.sql
//! ```
//!
//! The numeric prefix is the version; leading zeros are allowed and ignored.

use std::sync::OnceLock;

use regex::Regex;
use strata_core::{Direction, Migration, MigrationSet, StrataError, StrataResult};

/// Produces the catalog of available migrations.
pub trait Source: Send + Sync {
    /// A short description of where migrations come from, for log output.
    fn name(&self) -> &str;

    /// Loads and validates every migration.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::ConfigurationError`] when the source cannot be
    /// read, a file name is malformed, or versions collide.
    fn migrations(&self) -> StrataResult<MigrationSet>;
}

/// The parts of a migration file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Numeric version prefix.
    pub version: u64,
    /// Label between the version and the direction.
    pub name: String,
    /// `up` or `down`.
    pub direction: Direction,
}

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)_([A-Za-z0-9_\-]+)\.(up|down)\.sql$").unwrap()
    })
}

/// Returns `true` if `file_name` should be treated as a migration file.
pub fn is_migration_file(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}

/// Parses `<version>_<name>.<up|down>.sql`.
///
/// # Errors
///
/// Returns [`StrataError::ConfigurationError`] if the name does not follow the
/// pattern or the version does not fit in a `u64`.
///
/// # Examples
///
/// ```
/// use strata_core::Direction;
/// use strata_sources::parse_file_name;
///
/// let parsed = parse_file_name("0002_add_email.down.sql").unwrap();
/// assert_eq!(parsed.version, 2);
/// assert_eq!(parsed.name, "add_email");
/// assert_eq!(parsed.direction, Direction::Down);
/// ```
pub fn parse_file_name(file_name: &str) -> StrataResult<ParsedName> {
    let caps = file_name_regex().captures(file_name).ok_or_else(|| {
        StrataError::ConfigurationError(format!(
            "malformed migration file name '{file_name}' \
             (expected <version>_<name>.<up|down>.sql)"
        ))
    })?;

    let version = caps[1].parse::<u64>().map_err(|e| {
        StrataError::ConfigurationError(format!(
            "migration file '{file_name}' has an invalid version: {e}"
        ))
    })?;

    Ok(ParsedName {
        version,
        name: caps[2].to_string(),
        direction: caps[3].parse()?,
    })
}

/// Builds a [`Migration`] from a file name and body.
pub fn migration_from_file(file_name: &str, body: impl Into<String>) -> StrataResult<Migration> {
    let parsed = parse_file_name(file_name)?;
    Ok(Migration::new(
        parsed.version,
        parsed.name,
        parsed.direction,
        body,
    ))
}
