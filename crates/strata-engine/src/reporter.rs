//! Progress reporting.
//!
//! The engine never logs through global state of its own; it calls the
//! [`Reporter`] in its configuration. [`TracingReporter`] forwards events to
//! `tracing` (and therefore to whatever subscriber the binary installed),
//! [`NullReporter`] drops them.

use std::time::Duration;

use strata_core::{Direction, Migration, StrataError};

/// Receives engine progress events. Every method defaults to doing nothing.
pub trait Reporter: Send + Sync {
    /// The migration lock was taken.
    fn lock_acquired(&self, _key: &str) {}

    /// The migration lock was given back.
    fn lock_released(&self, _key: &str) {}

    /// A migration is about to run.
    fn migration_started(&self, _migration: &Migration) {}

    /// A migration ran and its tracking row was updated.
    fn migration_applied(&self, _migration: &Migration, _elapsed: Duration) {}

    /// A migration failed; the sequence stops after this.
    fn migration_failed(&self, _migration: &Migration, _error: &StrataError) {}

    /// An apply sequence ran to completion.
    fn finished(&self, _direction: Direction, _applied: usize) {}
}

/// Reports through `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn lock_acquired(&self, key: &str) {
        tracing::debug!(lock_key = key, "lock acquired");
    }

    fn lock_released(&self, key: &str) {
        tracing::debug!(lock_key = key, "lock released");
    }

    fn migration_started(&self, migration: &Migration) {
        tracing::info!(
            version = migration.version,
            name = %migration.name,
            direction = %migration.direction,
            "applying migration"
        );
    }

    fn migration_applied(&self, migration: &Migration, elapsed: Duration) {
        tracing::info!(
            version = migration.version,
            name = %migration.name,
            direction = %migration.direction,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "migration applied"
        );
    }

    fn migration_failed(&self, migration: &Migration, error: &StrataError) {
        tracing::error!(
            version = migration.version,
            name = %migration.name,
            direction = %migration.direction,
            error = %error,
            "migration failed"
        );
    }

    fn finished(&self, direction: Direction, applied: usize) {
        tracing::info!(%direction, applied, "apply sequence finished");
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}
