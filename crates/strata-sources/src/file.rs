//! Filesystem migration source.

use std::path::{Path, PathBuf};

use strata_core::settings::DEFAULT_MAX_MIGRATION_SIZE;
use strata_core::{MigrationSet, StrataError, StrataResult};

use crate::source::{is_migration_file, migration_from_file, Source};

/// Reads migrations from the `.sql` files in one directory.
///
/// Subdirectories and files without a `.sql` extension are ignored. Files are
/// read every time [`Source::migrations`] is called.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
    label: String,
    max_size: u64,
}

impl FileSource {
    /// Opens the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::ConfigurationError`] if `path` is not a directory.
    pub fn open(path: impl AsRef<Path>) -> StrataResult<Self> {
        let dir = path.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(StrataError::ConfigurationError(format!(
                "migration directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            label: format!("file://{}", dir.display()),
            dir,
            max_size: DEFAULT_MAX_MIGRATION_SIZE,
        })
    }

    /// Sets the largest migration file, in bytes, that will be read.
    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// The directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_error(&self, path: &Path, e: &std::io::Error) -> StrataError {
        StrataError::ConfigurationError(format!(
            "failed to read '{}' in {}: {e}",
            path.display(),
            self.label
        ))
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn migrations(&self) -> StrataResult<MigrationSet> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| self.read_error(&self.dir, &e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.read_error(&self.dir, &e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(raw_name) = path.file_name() else {
                continue;
            };
            let Some(file_name) = raw_name.to_str() else {
                let lossy = raw_name.to_string_lossy();
                if is_migration_file(&lossy) {
                    return Err(StrataError::ConfigurationError(format!(
                        "migration file name '{lossy}' in {} is not valid UTF-8",
                        self.label
                    )));
                }
                continue;
            };
            if is_migration_file(file_name) {
                files.push((file_name.to_string(), path));
            }
        }
        files.sort();

        let mut migrations = Vec::with_capacity(files.len());
        for (file_name, path) in files {
            let size = std::fs::metadata(&path)
                .map_err(|e| self.read_error(&path, &e))?
                .len();
            if size > self.max_size {
                return Err(StrataError::ConfigurationError(format!(
                    "migration '{file_name}' is {size} bytes, over the {} byte limit",
                    self.max_size
                )));
            }
            let body = std::fs::read_to_string(&path).map_err(|e| self.read_error(&path, &e))?;
            migrations.push(migration_from_file(&file_name, body)?);
        }

        tracing::debug!(source = %self.label, files = migrations.len(), "read migration files");
        MigrationSet::new(migrations)
    }
}
