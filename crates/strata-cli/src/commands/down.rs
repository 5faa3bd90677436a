//! The `down` command: revert migrations a number of steps.

use async_trait::async_trait;
use strata_core::{ApplyError, Settings};
use strata_engine::{apply, CancellationToken};

use super::{number, number_arg, report_count};
use crate::command::Command;

/// Reverts up to `--number` applied migrations, most recent first.
///
/// `--number 0` reverts nothing; `--all` reverts every applied migration.
pub struct DownCommand;

#[async_trait]
impl Command for DownCommand {
    fn name(&self) -> &'static str {
        "down"
    }

    fn help(&self) -> &'static str {
        "Apply migrations backwards a number of steps"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(number_arg("Apply N down migrations"))
            .arg(
                clap::Arg::new("all")
                    .long("all")
                    .action(clap::ArgAction::SetTrue)
                    .conflicts_with("number")
                    .help("Revert every applied migration"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Result<(), ApplyError> {
        if matches.get_flag("all") {
            println!("Attempting to revert all applied migrations...");
            return report_count(apply::down_all(settings, cancel).await);
        }

        let steps = number(matches);
        println!("Attempting to apply {steps} down migrations...");
        report_count(apply::down(settings, steps, cancel).await)
    }
}
