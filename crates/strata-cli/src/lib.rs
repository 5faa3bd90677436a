//! # strata-cli
//!
//! The `strata` command-line tool.
//!
//! - [`command`] - The [`Command`](command::Command) trait and [`CommandRegistry`](command::CommandRegistry)
//! - [`commands`] - Built-in `apply` commands: `migrate`, `up`, `down`, `status`
//! - [`config`] - Shared connection flags and layered settings resolution
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_cli::command::CommandRegistry;
//! use strata_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"migrate"));
//! assert!(names.contains(&"down"));
//! ```

// result_large_err: ApplyError carries the full StrataError by value
// unused_async: command handlers keep one async signature
#![allow(clippy::result_large_err)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;
pub mod config;

use strata_core::ApplyError;

/// Formats a failed invocation for standard error.
///
/// Database failures mean the sequence stopped part-way, so the headline says
/// that nothing after the failing migration ran.
pub fn render_error(err: &ApplyError) -> String {
    let headline = if err.is_database_error() {
        "An Error Occurred: This and all later migrations have been cancelled"
    } else {
        "An Error Occurred:"
    };
    format!("{headline}\n--> {err}\n")
}
