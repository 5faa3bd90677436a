//! Driver lookup by name.
//!
//! The [`DriverRegistry`] maps driver names (as passed on the command line or
//! in settings) to [`DriverFactory`] implementations. Which built-in drivers
//! are present depends on the crate features that were enabled.

use std::collections::HashMap;
use std::sync::Arc;

use strata_core::{StrataError, StrataResult};

use crate::base::Driver;

/// Opens a connected [`Driver`] from a DSN.
#[async_trait::async_trait]
pub trait DriverFactory: Send + Sync {
    /// Connects and returns a ready driver.
    async fn open(&self, dsn: &str) -> StrataResult<Box<dyn Driver>>;
}

/// A registry of driver factories, keyed by name.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every driver compiled into this build.
    ///
    /// `postgres` and `postgresql` are aliases for the same driver.
    pub fn with_builtin_drivers() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register("sqlite", Arc::new(crate::sqlite::SqliteFactory));
        #[cfg(feature = "postgres")]
        {
            registry.register("postgres", Arc::new(crate::postgresql::PostgresFactory));
            registry.register("postgresql", Arc::new(crate::postgresql::PostgresFactory));
        }
        #[cfg(feature = "mysql")]
        registry.register("mysql", Arc::new(crate::mysql::MySqlFactory));
        registry
    }

    /// Registers a factory. A factory already registered under `name` is replaced.
    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn DriverFactory>) {
        self.factories.insert(name.into(), factory);
    }

    /// Returns `true` if a driver is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns a sorted list of all registered driver names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Opens the driver registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::ConfigurationError`] if no driver has that name,
    /// or whatever the factory returns.
    pub async fn open(&self, name: &str, dsn: &str) -> StrataResult<Box<dyn Driver>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            StrataError::ConfigurationError(format!(
                "unsupported driver '{name}' (available: {})",
                self.names().join(", ")
            ))
        })?;
        tracing::debug!(driver = name, "opening database driver");
        factory.open(dsn).await
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDatabase, MemoryDriver};

    struct MemoryFactory(MemoryDatabase);

    #[async_trait::async_trait]
    impl DriverFactory for MemoryFactory {
        async fn open(&self, _dsn: &str) -> StrataResult<Box<dyn Driver>> {
            Ok(Box::new(MemoryDriver::new(self.0.clone())))
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = DriverRegistry::new();
        assert!(registry.names().is_empty());
        assert!(!registry.contains("sqlite"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_builtin_contains_sqlite() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.contains("sqlite"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_builtin_postgres_aliases() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.contains("postgres"));
        assert!(registry.contains("postgresql"));
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = DriverRegistry::new();
        let db = MemoryDatabase::new();
        registry.register("zeta", Arc::new(MemoryFactory(db.clone())));
        registry.register("alpha", Arc::new(MemoryFactory(db)));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_open_registered() {
        let mut registry = DriverRegistry::new();
        registry.register("memory", Arc::new(MemoryFactory(MemoryDatabase::new())));
        let driver = registry.open("memory", "ignored").await.unwrap();
        assert_eq!(driver.vendor(), "memory");
    }

    #[tokio::test]
    async fn test_open_unknown_driver() {
        let registry = DriverRegistry::new();
        let err = registry.open("oracle", "dsn").await.err().unwrap();
        assert!(matches!(err, StrataError::ConfigurationError(_)));
        assert!(err.to_string().contains("unsupported driver 'oracle'"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_memory() {
        let registry = DriverRegistry::with_builtin_drivers();
        let driver = registry.open("sqlite", ":memory:").await.unwrap();
        assert_eq!(driver.vendor(), "sqlite");
    }
}
