//! End-to-end tests: migration files on disk applied to real SQLite databases
//! through the settings-driven entry points.

#![cfg(feature = "sqlite")]

use std::time::Duration;

use strata_backends::{Driver, SqliteDriver};
use strata_core::{ErrorKind, Settings};
use strata_engine::{apply, CancellationToken, Engine, EngineConfig};
use strata_sources::FileSource;

// ── Helpers ─────────────────────────────────────────────────────────

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("migrations")).unwrap();
        Self { dir }
    }

    fn migration(&self, file_name: &str, body: &str) -> &Self {
        std::fs::write(self.migrations().join(file_name), body).unwrap();
        self
    }

    fn migrations(&self) -> std::path::PathBuf {
        self.dir.path().join("migrations")
    }

    fn db(&self) -> std::path::PathBuf {
        self.dir.path().join("app.db")
    }

    fn settings(&self) -> Settings {
        Settings {
            driver: "sqlite".into(),
            dsn: self.db().display().to_string(),
            path: self.migrations().display().to_string(),
            ..Settings::default()
        }
    }

    fn standard(&self) -> &Self {
        self.migration(
            "000001_create_users.up.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        )
        .migration("000001_create_users.down.sql", "DROP TABLE users;")
        .migration(
            "000002_create_posts.up.sql",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));",
        )
        .migration("000002_create_posts.down.sql", "DROP TABLE posts;")
        .migration(
            "000003_add_email.up.sql",
            "ALTER TABLE users ADD COLUMN email TEXT;",
        )
        .migration(
            "000003_add_email.down.sql",
            "ALTER TABLE users DROP COLUMN email;",
        )
    }
}

// ── Settings-driven operations ──────────────────────────────────────

#[tokio::test]
async fn test_migrate_up_down_round_trip() {
    let fx = Fixture::new();
    fx.standard();
    let settings = fx.settings();

    apply::migrate(&settings, CancellationToken::new()).await.unwrap();
    let rows = apply::status(&settings, CancellationToken::new()).await.unwrap();
    assert!(rows.iter().all(|r| r.is_applied()));

    assert_eq!(apply::up(&settings, 0, CancellationToken::new()).await.unwrap(), 0);

    assert_eq!(apply::down(&settings, 1, CancellationToken::new()).await.unwrap(), 1);
    assert_eq!(apply::down(&settings, 0, CancellationToken::new()).await.unwrap(), 0);
    assert_eq!(apply::down_all(&settings, CancellationToken::new()).await.unwrap(), 2);

    let rows = apply::status(&settings, CancellationToken::new()).await.unwrap();
    assert!(rows.iter().all(|r| !r.is_applied()));

    // Back at the baseline: the tables can be created again.
    let driver = SqliteDriver::open(fx.db()).unwrap();
    driver
        .execute_migration(
            "CREATE TABLE users (id INTEGER); CREATE TABLE posts (id INTEGER);",
            Duration::from_secs(5),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_up_with_limit() {
    let fx = Fixture::new();
    fx.standard();
    let settings = fx.settings();

    assert_eq!(apply::up(&settings, 2, CancellationToken::new()).await.unwrap(), 2);
    let rows = apply::status(&settings, CancellationToken::new()).await.unwrap();
    let applied: Vec<u64> = rows.iter().filter(|r| r.is_applied()).map(|r| r.version).collect();
    assert_eq!(applied, vec![1, 2]);
}

#[tokio::test]
async fn test_failed_migration_is_rolled_back_and_halts() {
    let fx = Fixture::new();
    fx.migration("1_users.up.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY);")
        .migration(
            "2_broken.up.sql",
            "CREATE TABLE half (id INTEGER); INSERT INTO missing VALUES (1);",
        )
        .migration("3_never.up.sql", "CREATE TABLE never (id INTEGER);");
    let settings = fx.settings();

    let err = apply::up(&settings, 3, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.applied, 1);
    assert!(err.is_database_error());
    assert!(err.to_string().contains("migration 2 (broken, up) failed"));

    // SQLite DDL is transactional: the partial migration left nothing behind.
    let driver = SqliteDriver::open(fx.db()).unwrap();
    driver
        .execute_migration("CREATE TABLE half (id INTEGER);", Duration::from_secs(5))
        .await
        .unwrap();
    let records = driver.applied_records("db_migrations").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "users");
}

#[tokio::test]
async fn test_unknown_driver_is_configuration_error() {
    let fx = Fixture::new();
    let settings = Settings {
        driver: "oracle".into(),
        ..fx.settings()
    };
    let err = apply::migrate(&settings, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.applied, 0);
}

#[tokio::test]
async fn test_missing_directory_is_configuration_error() {
    let fx = Fixture::new();
    let settings = Settings {
        path: fx.dir.path().join("nope").display().to_string(),
        ..fx.settings()
    };
    let err = apply::up(&settings, 0, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_custom_tracking_table_and_lock_key() {
    let fx = Fixture::new();
    fx.standard();
    let settings = Settings {
        migrations_table: "schema_versions".into(),
        lock_key: "deploy".into(),
        ..fx.settings()
    };
    apply::migrate(&settings, CancellationToken::new()).await.unwrap();

    let driver = SqliteDriver::open(fx.db()).unwrap();
    assert_eq!(driver.applied_records("schema_versions").await.unwrap().len(), 3);
    assert!(driver.lock_holder("deploy").await.unwrap().is_none());
}

// ── Cross-connection locking ────────────────────────────────────────

#[tokio::test]
async fn test_lock_held_by_other_connection() {
    let fx = Fixture::new();
    fx.standard();

    let holder = SqliteDriver::open(fx.db()).unwrap();
    holder.acquire_lock("mutex_migrations").await.unwrap();

    let err = apply::migrate(&fx.settings(), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lock);
    assert_eq!(err.applied, 0);

    holder.release_lock("mutex_migrations").await.unwrap();
    apply::migrate(&fx.settings(), CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_gap_detected_on_real_database() {
    let fx = Fixture::new();
    fx.standard();
    {
        let driver = SqliteDriver::open(fx.db()).unwrap();
        driver.ensure_tracking_table("db_migrations").await.unwrap();
        driver.record_applied("db_migrations", 1, "create_users").await.unwrap();
        driver.record_applied("db_migrations", 3, "add_email").await.unwrap();
        driver.close().await.unwrap();
    }

    let source = FileSource::open(fx.migrations()).unwrap();
    let driver = SqliteDriver::open(fx.db()).unwrap();
    let err = Engine::new(Box::new(driver), &source, EngineConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
