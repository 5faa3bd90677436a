//! The lock protocol around every apply sequence.
//!
//! [`with_lock`] takes the driver's named lock, runs a body, and releases the
//! lock on every exit path: success, error, cancellation, and panic. A panic
//! in the body is caught, the lock is released, and the panic is resumed.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use strata_backends::Driver;
use strata_core::{ApplyError, StrataError, StrataResult};
use tokio_util::sync::CancellationToken;

use crate::plan::MigrationStatus;
use crate::reporter::Reporter;

/// The result of a locked body, for reporting partial progress when the lock
/// cannot be released afterwards.
pub trait Progress {
    /// Migrations applied by the body.
    fn applied(&self) -> usize;
}

impl Progress for usize {
    fn applied(&self) -> usize {
        *self
    }
}

impl Progress for Vec<MigrationStatus> {
    fn applied(&self) -> usize {
        0
    }
}

/// Takes the lock, giving up early if `cancel` fires.
///
/// # Errors
///
/// [`StrataError::Cancelled`] if the token fired before or during the
/// attempt, otherwise whatever the driver returns (normally
/// [`StrataError::LockError`]).
pub async fn acquire(
    driver: &dyn Driver,
    key: &str,
    cancel: &CancellationToken,
) -> StrataResult<()> {
    if cancel.is_cancelled() {
        return Err(StrataError::Cancelled(
            "cancelled before acquiring the migration lock".to_string(),
        ));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            // The attempt may have reached the database before it was dropped.
            if let Err(e) = driver.release_lock(key).await {
                tracing::warn!(lock_key = key, error = %e, "release after cancelled acquire failed");
            }
            Err(StrataError::Cancelled(
                "cancelled while acquiring the migration lock".to_string(),
            ))
        }
        result = driver.acquire_lock(key) => result,
    }
}

/// Runs `body` while holding the lock named `key`.
///
/// Errors from the body take precedence over a failure to release; a release
/// failure after a successful body is returned as a [`StrataError::LockError`]
/// carrying the body's progress.
pub async fn with_lock<T, Fut>(
    driver: &dyn Driver,
    key: &str,
    cancel: &CancellationToken,
    reporter: &dyn Reporter,
    body: Fut,
) -> Result<T, ApplyError>
where
    T: Progress,
    Fut: Future<Output = Result<T, ApplyError>>,
{
    acquire(driver, key, cancel)
        .await
        .map_err(|e| ApplyError::new(0, e))?;
    reporter.lock_acquired(key);

    let outcome = AssertUnwindSafe(body).catch_unwind().await;

    let released = driver.release_lock(key).await;
    match &released {
        Ok(()) => reporter.lock_released(key),
        Err(e) => tracing::error!(lock_key = key, error = %e, "failed to release migration lock"),
    }

    match outcome {
        Err(panic) => std::panic::resume_unwind(panic),
        Ok(Err(e)) => Err(e),
        Ok(Ok(value)) => match released {
            Ok(()) => Ok(value),
            Err(e) => Err(ApplyError::new(value.applied(), e)),
        },
    }
}

#[cfg(test)]
mod tests {
    use strata_backends::{MemoryDatabase, MemoryDriver};

    use super::*;
    use crate::reporter::NullReporter;

    const KEY: &str = "mutex_migrations";

    #[tokio::test]
    async fn test_lock_released_after_success() {
        let db = MemoryDatabase::new();
        let driver = MemoryDriver::new(db.clone());
        let cancel = CancellationToken::new();

        let n = with_lock(&driver, KEY, &cancel, &NullReporter, async {
            assert!(db.is_locked(KEY));
            Ok(3_usize)
        })
        .await
        .unwrap();

        assert_eq!(n, 3);
        assert!(!db.is_locked(KEY));
    }

    #[tokio::test]
    async fn test_lock_released_after_error() {
        let db = MemoryDatabase::new();
        let driver = MemoryDriver::new(db.clone());
        let cancel = CancellationToken::new();

        let err = with_lock(&driver, KEY, &cancel, &NullReporter, async {
            Err::<usize, _>(ApplyError::new(
                1,
                StrataError::DatabaseError("boom".into()),
            ))
        })
        .await
        .unwrap_err();

        assert_eq!(err.applied, 1);
        assert!(!db.is_locked(KEY));
    }

    #[tokio::test]
    async fn test_held_lock_is_lock_error() {
        let db = MemoryDatabase::new();
        let holder = MemoryDriver::new(db.clone());
        holder.acquire_lock(KEY).await.unwrap();

        let driver = MemoryDriver::new(db.clone());
        let cancel = CancellationToken::new();
        let ran = std::sync::atomic::AtomicBool::new(false);
        let err = with_lock(&driver, KEY, &cancel, &NullReporter, async {
            ran.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(1_usize)
        })
        .await
        .unwrap_err();

        assert!(matches!(err.source, StrataError::LockError(_)));
        assert_eq!(err.applied, 0);
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        // The other holder still owns the lock.
        assert!(db.is_locked(KEY));
    }

    #[tokio::test]
    async fn test_cancelled_before_acquire() {
        let db = MemoryDatabase::new();
        let driver = MemoryDriver::new(db.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = acquire(&driver, KEY, &cancel).await.unwrap_err();
        assert!(matches!(err, StrataError::Cancelled(_)));
        assert!(!db.is_locked(KEY));
    }

    #[tokio::test]
    async fn test_release_failure_reports_progress() {
        let db = MemoryDatabase::new();
        let driver = MemoryDriver::new(db.clone());
        let cancel = CancellationToken::new();
        db.fail_release(true);

        let err = with_lock(&driver, KEY, &cancel, &NullReporter, async { Ok(2_usize) })
            .await
            .unwrap_err();
        assert_eq!(err.applied, 2);
        assert!(matches!(err.source, StrataError::LockError(_)));
    }
}
