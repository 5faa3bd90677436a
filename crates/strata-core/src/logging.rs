//! Logging integration for strata.
//!
//! Provides a helper for installing a [`tracing`] subscriber from
//! [`Settings`](crate::settings::Settings), and the span every engine runs in.
//! Library crates only emit events; installing the subscriber is the binary's
//! job.

use crate::settings::{LogFormat, Settings};

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "strata_engine=trace"). `RUST_LOG`, when set, takes precedence. Installing
/// twice is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match settings.log_format {
        LogFormat::Pretty => {
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init()
                .ok();
        }
        LogFormat::Json => {
            fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .json()
                .try_init()
                .ok();
        }
    }
}

/// Creates the tracing span an engine runs its operations in.
///
/// # Examples
///
/// ```
/// use strata_core::logging::engine_span;
///
/// let span = engine_span("sqlite", "mutex_migrations");
/// let _guard = span.enter();
/// tracing::info!("applying migrations");
/// ```
pub fn engine_span(driver: &str, lock_key: &str) -> tracing::Span {
    tracing::info_span!("engine", driver = driver, lock_key = lock_key)
}
