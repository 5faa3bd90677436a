//! Command framework for the strata CLI.
//!
//! This module provides the [`Command`] trait for defining subcommands of
//! `strata apply` and [`CommandRegistry`] for registering and dispatching them.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use strata_cli::command::Command;
//! use strata_core::{ApplyError, Settings};
//! use strata_engine::CancellationToken;
//!
//! struct PingCommand;
//!
//! #[async_trait]
//! impl Command for PingCommand {
//!     fn name(&self) -> &str { "ping" }
//!     fn help(&self) -> &str { "Check that the database is reachable" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         settings: &Settings,
//!         cancel: CancellationToken,
//!     ) -> Result<(), ApplyError> {
//!         strata_engine::apply::status(settings, cancel).await?;
//!         println!("ok");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use strata_core::{ApplyError, Settings, StrataError, StrataResult};
use strata_engine::CancellationToken;

use crate::config;

/// Name of the command group every registered command lives under.
pub const APPLY: &str = "apply";

/// A subcommand of `strata apply`.
#[async_trait]
pub trait Command: Send + Sync {
    /// Returns the name used to invoke this command.
    fn name(&self) -> &str;

    /// Returns a short help description.
    fn help(&self) -> &str;

    /// Adds command-specific arguments. The shared connection flags are added
    /// by the registry and need not be repeated here.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Runs the command with fully resolved settings.
    ///
    /// `cancel` fires when the user interrupts the process; it is handed to
    /// the engine, which stops before the next migration.
    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Result<(), ApplyError>;
}

/// A registry of commands, keyed by name.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command, replacing any existing command with the same name.
    pub fn register(&mut self, command: Box<dyn Command>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the `strata` clap command: an `apply` group carrying the shared
    /// connection flags, with every registered command beneath it.
    pub fn build_cli(&self) -> clap::Command {
        let mut apply = config::shared_args(
            clap::Command::new(APPLY)
                .about("Applies migrations")
                .subcommand_required(true)
                .arg_required_else_help(true),
        );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap wants &'static str names. Commands are registered once at
            // startup, so the leak is bounded.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            apply = apply.subcommand(cmd.add_arguments(subcmd));
        }

        clap::Command::new("strata")
            .about("Ordered, locked, resumable SQL schema migrations")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(apply)
    }

    /// Executes the command selected by `matches` (as produced by
    /// [`build_cli`](Self::build_cli)).
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Result<(), ApplyError> {
        let (name, sub_matches) = selected(matches)?;
        let cmd = self.get(name).ok_or_else(|| {
            StrataError::ConfigurationError(format!("Unknown command: {name}"))
        })?;
        tracing::debug!(command = name, "dispatching");
        cmd.handle(sub_matches, settings, cancel).await
    }
}

/// Returns the name and matches of the command selected under `apply`.
pub fn selected(matches: &clap::ArgMatches) -> StrataResult<(&str, &clap::ArgMatches)> {
    let apply = match matches.subcommand() {
        Some((APPLY, apply)) => apply,
        Some((other, _)) => {
            return Err(StrataError::ConfigurationError(format!(
                "Unknown command: {other}"
            )))
        }
        None => {
            return Err(StrataError::ConfigurationError(
                "No subcommand specified".to_string(),
            ))
        }
    };
    apply
        .subcommand()
        .ok_or_else(|| StrataError::ConfigurationError("No subcommand specified".to_string()))
}
