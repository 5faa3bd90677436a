//! Migrations compiled into the binary.

use strata_core::{MigrationSet, StrataResult};

use crate::source::{is_migration_file, migration_from_file, Source};

/// A source over `(file name, body)` pairs embedded at compile time.
///
/// # Examples
///
/// ```
/// use strata_sources::{EmbeddedSource, Source};
///
/// static MIGRATIONS: &[(&str, &str)] = &[
///     ("1_users.up.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY);"),
///     ("1_users.down.sql", "DROP TABLE users;"),
/// ];
///
/// let source = EmbeddedSource::new(MIGRATIONS);
/// assert_eq!(source.migrations().unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    files: &'static [(&'static str, &'static str)],
    label: &'static str,
}

impl EmbeddedSource {
    /// Wraps a static list of files, typically built with `include_str!`.
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            files,
            label: "embedded",
        }
    }

    /// Overrides the label reported by [`Source::name`].
    #[must_use]
    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}

impl Source for EmbeddedSource {
    fn name(&self) -> &str {
        self.label
    }

    fn migrations(&self) -> StrataResult<MigrationSet> {
        let migrations = self
            .files
            .iter()
            .filter(|(file_name, _)| is_migration_file(file_name))
            .map(|(file_name, body)| migration_from_file(file_name, *body))
            .collect::<StrataResult<Vec<_>>>()?;
        MigrationSet::new(migrations)
    }
}
