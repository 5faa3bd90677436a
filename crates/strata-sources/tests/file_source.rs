//! Integration tests for reading a realistic migrations directory.

use strata_core::{Direction, StrataError};
use strata_sources::{FileSource, Source};

// ── Helpers ─────────────────────────────────────────────────────────

fn migrations_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in files {
        std::fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn test_full_catalog() {
    let dir = migrations_dir(&[
        ("000001_create_users.up.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY);"),
        ("000001_create_users.down.sql", "DROP TABLE users;"),
        ("000002_add_email.up.sql", "ALTER TABLE users ADD COLUMN email TEXT;"),
        ("000002_add_email.down.sql", "ALTER TABLE users DROP COLUMN email;"),
        ("000003_seed.up.sql", "INSERT INTO users (id) VALUES (1);"),
        (".DS_Store", ""),
    ]);

    let source = FileSource::open(dir.path()).unwrap();
    let set = source.migrations().unwrap();

    assert_eq!(set.len(), 3);
    let names: Vec<&str> = set.forward().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["create_users", "add_email", "seed"]);
    assert!(set.forward().all(|m| m.direction == Direction::Up));
    assert_eq!(set.backward(2).unwrap().direction, Direction::Down);
    assert!(set.backward(3).is_none());
}

#[test]
fn test_rereads_on_each_call() {
    let dir = migrations_dir(&[("1_a.up.sql", "SELECT 1;")]);
    let source = FileSource::open(dir.path()).unwrap();
    assert_eq!(source.migrations().unwrap().len(), 1);

    std::fs::write(dir.path().join("2_b.up.sql"), "SELECT 2;").unwrap();
    assert_eq!(source.migrations().unwrap().len(), 2);
}

#[test]
fn test_mismatched_pair_names() {
    let dir = migrations_dir(&[
        ("1_users.up.sql", "CREATE TABLE users ();"),
        ("1_people.down.sql", "DROP TABLE people;"),
    ]);
    let err = FileSource::open(dir.path()).unwrap().migrations().unwrap_err();
    assert!(matches!(err, StrataError::ConfigurationError(_)));
    assert!(err.to_string().contains("mismatched names"));
}
