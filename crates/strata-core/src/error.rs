//! Core error types for strata.
//!
//! Every failure in the workspace is a [`StrataError`]. The variants map onto a
//! small taxonomy ([`ErrorKind`]) that callers use to decide whether a failure
//! is a fixable input problem, a busy lock, a schema-level database failure, or
//! a cancellation.
//!
//! Apply operations additionally report how far they got before failing, via
//! [`ApplyError`].

use thiserror::Error;

use crate::migration::Direction;

/// The coarse classification of a [`StrataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input: unknown driver, unreadable source, duplicate versions, gaps.
    Configuration,
    /// The migration lock is held by another holder.
    Lock,
    /// A migration's statements failed or timed out.
    Database,
    /// The cancellation signal fired.
    Cancelled,
    /// Connection-level failures and misuse of a closed engine.
    Operational,
}

/// The primary error type for strata.
#[derive(Error, Debug)]
pub enum StrataError {
    // ── Input ────────────────────────────────────────────────────────

    /// A configuration value, the migration source, or the applied set is invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Locking ──────────────────────────────────────────────────────

    /// The migration lock could not be acquired or released.
    #[error("Lock error: {0}")]
    LockError(String),

    // ── Database ─────────────────────────────────────────────────────

    /// A statement failed or timed out inside the database.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A specific migration failed; wraps the underlying database failure.
    #[error("migration {version} ({name}, {direction}) failed: {source}")]
    MigrationFailed {
        /// Version of the failed migration.
        version: u64,
        /// Name of the failed migration.
        name: String,
        /// Direction the migration was being applied in.
        direction: Direction,
        /// The underlying failure.
        #[source]
        source: Box<StrataError>,
    },

    // ── Control flow ─────────────────────────────────────────────────

    /// The cancellation signal fired before or during the apply sequence.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Connection failures, closed engines, and other operational problems.
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StrataError {
    /// Returns the taxonomy bucket this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationError(_) | Self::IoError(_) => ErrorKind::Configuration,
            Self::LockError(_) => ErrorKind::Lock,
            Self::DatabaseError(_) | Self::MigrationFailed { .. } => ErrorKind::Database,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::OperationalError(_) => ErrorKind::Operational,
        }
    }

    /// Returns `true` for failures that halt an apply sequence at the schema level.
    ///
    /// The CLI renders these as "this and all later migrations have been cancelled".
    pub const fn is_database_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Database)
    }

    /// Wraps `source` as the failure of one specific migration.
    pub fn migration_failed(
        version: u64,
        name: impl Into<String>,
        direction: Direction,
        source: Self,
    ) -> Self {
        Self::MigrationFailed {
            version,
            name: name.into(),
            direction,
            source: Box::new(source),
        }
    }
}

/// A convenience type alias for `Result<T, StrataError>`.
pub type StrataResult<T> = Result<T, StrataError>;

/// The failure of an apply operation, together with the partial progress made.
///
/// Migrations counted in `applied` were executed and recorded before `source`
/// occurred and remain applied.
#[derive(Error, Debug)]
#[error("{source} ({applied} migration(s) applied before the failure)")]
pub struct ApplyError {
    /// Number of migrations successfully applied in this call.
    pub applied: usize,
    /// The error that stopped the sequence.
    #[source]
    pub source: StrataError,
}

impl ApplyError {
    /// Creates a new apply error.
    pub const fn new(applied: usize, source: StrataError) -> Self {
        Self { applied, source }
    }

    /// Returns the taxonomy bucket of the underlying error.
    pub const fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// See [`StrataError::is_database_error`].
    pub const fn is_database_error(&self) -> bool {
        self.source.is_database_error()
    }
}

impl From<StrataError> for ApplyError {
    fn from(source: StrataError) -> Self {
        Self::new(0, source)
    }
}
