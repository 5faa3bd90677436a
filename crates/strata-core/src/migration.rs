//! Migration data model.
//!
//! A [`Migration`] is one versioned, directional schema change. Sources produce
//! flat lists of them; [`MigrationSet`] validates such a list and indexes it by
//! version so the engine can reconcile it against the [`AppliedRecord`]s read
//! from the tracking table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};

/// Highest version the tracking table can store (its `version` column is a
/// signed 64-bit integer).
pub const MAX_VERSION: u64 = i64::MAX.unsigned_abs();

/// Longest migration name the tracking table can store, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// The direction a migration moves the schema in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Forward: applies a schema change.
    Up,
    /// Backward: reverts a schema change.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

impl FromStr for Direction {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(StrataError::ConfigurationError(format!(
                "unknown migration direction '{other}' (expected 'up' or 'down')"
            ))),
        }
    }
}

/// A single versioned, directional schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Ordering key, taken from the numeric prefix of the file name.
    pub version: u64,
    /// Human-readable label.
    pub name: String,
    /// Whether this migration applies or reverts `version`.
    pub direction: Direction,
    /// The SQL body to execute.
    pub statements: String,
}

impl Migration {
    /// Creates a new migration.
    pub fn new(
        version: u64,
        name: impl Into<String>,
        direction: Direction,
        statements: impl Into<String>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            direction,
            statements: statements.into(),
        }
    }

    /// Shorthand for a forward migration.
    pub fn up(version: u64, name: impl Into<String>, statements: impl Into<String>) -> Self {
        Self::new(version, name, Direction::Up, statements)
    }

    /// Shorthand for a backward migration.
    pub fn down(version: u64, name: impl Into<String>, statements: impl Into<String>) -> Self {
        Self::new(version, name, Direction::Down, statements)
    }

    /// Returns `true` if the statement body contains nothing but whitespace.
    pub fn is_empty(&self) -> bool {
        self.statements.trim().is_empty()
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.version, self.name, self.direction)
    }
}

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    /// Version of the applied forward migration.
    pub version: u64,
    /// Name of the applied forward migration.
    pub name: String,
    /// When the migration was recorded.
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    /// Builds a record from the Unix-seconds timestamp stored in the tracking table.
    ///
    /// Out-of-range timestamps fall back to the Unix epoch.
    pub fn from_unix(version: u64, name: impl Into<String>, applied_at: i64) -> Self {
        Self {
            version,
            name: name.into(),
            applied_at: DateTime::from_timestamp(applied_at, 0).unwrap_or_default(),
        }
    }
}

/// A validated catalog of migrations, indexed by version.
///
/// Invariants enforced at construction:
/// - every version and name fits the tracking table ([`MAX_VERSION`], [`MAX_NAME_LEN`])
/// - no two migrations share a `(version, direction)` pair
/// - every backward migration has a forward migration with the same version and name
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    forward: BTreeMap<u64, Migration>,
    backward: BTreeMap<u64, Migration>,
}

impl MigrationSet {
    /// Validates and indexes a list of migrations.
    pub fn new(migrations: impl IntoIterator<Item = Migration>) -> StrataResult<Self> {
        let mut set = Self::default();

        for migration in migrations {
            check_storable(&migration)?;
            let slot = match migration.direction {
                Direction::Up => &mut set.forward,
                Direction::Down => &mut set.backward,
            };
            if let Some(existing) = slot.get(&migration.version) {
                return Err(StrataError::ConfigurationError(format!(
                    "duplicate {} migration version {}: '{}' and '{}'",
                    migration.direction, migration.version, existing.name, migration.name
                )));
            }
            slot.insert(migration.version, migration);
        }

        for (version, down) in &set.backward {
            match set.forward.get(version) {
                None => {
                    return Err(StrataError::ConfigurationError(format!(
                        "down migration {version} ({}) has no matching up migration",
                        down.name
                    )));
                }
                Some(up) if up.name != down.name => {
                    return Err(StrataError::ConfigurationError(format!(
                        "migration {version} has mismatched names: up '{}', down '{}'",
                        up.name, down.name
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(set)
    }

    /// Forward migrations in ascending version order.
    pub fn forward(&self) -> impl DoubleEndedIterator<Item = &Migration> {
        self.forward.values()
    }

    /// Looks up the forward migration for `version`.
    pub fn up(&self, version: u64) -> Option<&Migration> {
        self.forward.get(&version)
    }

    /// Looks up the backward migration for `version`.
    pub fn backward(&self, version: u64) -> Option<&Migration> {
        self.backward.get(&version)
    }

    /// Number of forward migrations.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if the set has no forward migrations.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Versions of forward migrations with no backward counterpart.
    pub fn irreversible(&self) -> Vec<u64> {
        self.forward
            .keys()
            .filter(|v| !self.backward.contains_key(v))
            .copied()
            .collect()
    }
}

fn check_storable(migration: &Migration) -> StrataResult<()> {
    if migration.version > MAX_VERSION {
        return Err(StrataError::ConfigurationError(format!(
            "migration version {} ({}) exceeds the largest storable version {MAX_VERSION}",
            migration.version, migration.name
        )));
    }
    if migration.name.chars().count() > MAX_NAME_LEN {
        return Err(StrataError::ConfigurationError(format!(
            "migration {} has a name longer than {MAX_NAME_LEN} characters",
            migration.version
        )));
    }
    Ok(())
}
