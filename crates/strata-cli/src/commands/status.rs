//! The `status` command: list migrations with their applied state.

use async_trait::async_trait;
use strata_core::{ApplyError, Settings, StrataError};
use strata_engine::{apply, CancellationToken, MigrationStatus};

use crate::command::Command;

/// Prints every migration in the source and whether it has been applied.
pub struct StatusCommand;

#[async_trait]
impl Command for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn help(&self) -> &'static str {
        "Show which migrations are applied"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("format")
                .long("format")
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Output format"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Result<(), ApplyError> {
        let rows = apply::status(settings, cancel).await?;
        let output = match matches.get_one::<String>("format").map(String::as_str) {
            Some("json") => serde_json::to_string_pretty(&rows).map_err(|e| {
                StrataError::OperationalError(format!("failed to encode status: {e}"))
            })?,
            _ => render_text(&rows),
        };
        println!("{output}");
        Ok(())
    }
}

/// Renders one line per migration: `[X]` applied, `[ ]` pending.
pub fn render_text(rows: &[MigrationStatus]) -> String {
    if rows.is_empty() {
        return "no migrations found.".to_string();
    }
    let width = rows
        .iter()
        .map(|r| r.version.to_string().len())
        .max()
        .unwrap_or(1);

    rows.iter()
        .map(|row| {
            let mark = if row.is_applied() { "X" } else { " " };
            let mut line = format!("[{mark}] {:>width$} {}", row.version, row.name);
            if let Some(at) = row.applied_at {
                line.push_str(&format!(" (applied {})", at.format("%Y-%m-%d %H:%M:%S UTC")));
            }
            if !row.reversible {
                line.push_str(" [irreversible]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
