//! The shared connection flags of `strata apply` and the settings they
//! resolve to.
//!
//! Settings are layered: defaults, then the TOML file named by `--config`,
//! then `STRATA_*` environment variables, then explicit flags. Flags carry no
//! clap defaults so that an unset flag never masks a file or environment value.

use strata_core::settings::{DEFAULT_LOCK_KEY, DEFAULT_MIGRATIONS_TABLE, DEFAULT_TIMEOUT_SECS};
use strata_core::{settings_loader, LogFormat, Settings, StrataResult};

/// Adds the shared flags to `cmd`. They are global, so they may appear
/// before or after the subcommand name.
pub fn shared_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        clap::Arg::new("driver")
            .long("driver")
            .short('d')
            .global(true)
            .help("The database driver of the migrations (sqlite, postgres, mysql)"),
    )
    .arg(
        clap::Arg::new("dsn")
            .long("dsn")
            .global(true)
            .help("The DSN of the database"),
    )
    .arg(
        clap::Arg::new("path")
            .long("path")
            .short('p')
            .global(true)
            .help("The source path of the migrations"),
    )
    .arg(
        clap::Arg::new("timeout")
            .long("timeout")
            .short('t')
            .global(true)
            .value_parser(clap::value_parser!(u64))
            .help(format!(
                "The timeout in seconds for each migration file to run [default: {DEFAULT_TIMEOUT_SECS}]"
            )),
    )
    .arg(
        clap::Arg::new("migrations-table")
            .long("migrations-table")
            .short('m')
            .global(true)
            .help(format!(
                "The name of the migrations table [default: {DEFAULT_MIGRATIONS_TABLE}]"
            )),
    )
    .arg(
        clap::Arg::new("lock-key")
            .long("lock-key")
            .short('l')
            .global(true)
            .help(format!("The name of the mutex key [default: {DEFAULT_LOCK_KEY}]")),
    )
    .arg(
        clap::Arg::new("config")
            .long("config")
            .global(true)
            .help("A TOML settings file, read before environment variables and flags"),
    )
    .arg(
        clap::Arg::new("log-level")
            .long("log-level")
            .global(true)
            .help("Log filter, e.g. info or strata_engine=debug"),
    )
    .arg(
        clap::Arg::new("log-format")
            .long("log-format")
            .global(true)
            .value_parser(["pretty", "json"])
            .help("Log output format"),
    )
}

/// Resolves settings for `matches`, reading the process environment.
pub fn resolve(matches: &clap::ArgMatches) -> StrataResult<Settings> {
    resolve_with(matches, |key| std::env::var(key).ok())
}

/// Resolves settings for `matches` with an arbitrary environment lookup.
pub fn resolve_with<F>(matches: &clap::ArgMatches, lookup: F) -> StrataResult<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match matches.get_one::<String>("config") {
        Some(path) => settings_loader::from_toml_file(path)?,
        None => Settings::default(),
    };
    settings_loader::apply_overrides(&mut settings, lookup)?;

    let string = |id: &str| matches.get_one::<String>(id).cloned();
    if let Some(v) = string("driver") {
        settings.driver = v;
    }
    if let Some(v) = string("dsn") {
        settings.dsn = v;
    }
    if let Some(v) = string("path") {
        settings.path = v;
    }
    if let Some(v) = matches.get_one::<u64>("timeout") {
        settings.timeout_secs = *v;
    }
    if let Some(v) = string("migrations-table") {
        settings.migrations_table = v;
    }
    if let Some(v) = string("lock-key") {
        settings.lock_key = v;
    }
    if let Some(v) = string("log-level") {
        settings.log_level = v;
    }
    if let Some(v) = string("log-format") {
        settings.log_format = v.parse::<LogFormat>()?;
    }
    Ok(settings)
}
