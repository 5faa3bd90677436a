//! Built-in `strata apply` commands.
//!
//! Each command implements the [`Command`](crate::command::Command) trait and
//! delegates to the settings-driven operations in [`strata_engine::apply`].

pub mod down;
pub mod migrate;
pub mod status;
pub mod up;

pub use down::DownCommand;
pub use migrate::MigrateCommand;
pub use status::StatusCommand;
pub use up::UpCommand;

use strata_core::ApplyError;

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(MigrateCommand));
    registry.register(Box::new(UpCommand));
    registry.register(Box::new(DownCommand));
    registry.register(Box::new(StatusCommand));
}

/// The line printed after an apply sequence, successful or not.
pub fn applied_message(applied: usize) -> String {
    match applied {
        0 => "no migrations applied.".to_string(),
        n => format!("{n} migrations applied."),
    }
}

/// Prints the count carried by `result` and passes the result through.
fn report_count(result: Result<usize, ApplyError>) -> Result<(), ApplyError> {
    let applied = match &result {
        Ok(n) => *n,
        Err(e) => e.applied,
    };
    println!("{}", applied_message(applied));
    result.map(|_| ())
}

/// Adds the `--number` flag shared by `up` and `down`.
fn number_arg(help: &'static str) -> clap::Arg {
    clap::Arg::new("number")
        .long("number")
        .short('n')
        .value_parser(clap::value_parser!(usize))
        .default_value("0")
        .help(help)
}

fn number(matches: &clap::ArgMatches) -> usize {
    matches.get_one::<usize>("number").copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::StrataError;

    #[test]
    fn test_register_builtin_commands() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);
        assert_eq!(registry.list_commands(), vec!["down", "migrate", "status", "up"]);
    }

    #[test]
    fn test_applied_message() {
        assert_eq!(applied_message(0), "no migrations applied.");
        assert_eq!(applied_message(1), "1 migrations applied.");
        assert_eq!(applied_message(12), "12 migrations applied.");
    }

    #[test]
    fn test_report_count_passes_error_through() {
        let err = ApplyError::new(3, StrataError::DatabaseError("boom".into()));
        let result = report_count(Err(err));
        assert_eq!(result.unwrap_err().applied, 3);
        assert!(report_count(Ok(2)).is_ok());
    }
}
