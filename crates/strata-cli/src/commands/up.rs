//! The `up` command: apply forward migrations a number of steps.

use async_trait::async_trait;
use strata_core::{ApplyError, Settings};
use strata_engine::{apply, CancellationToken};

use super::{number, number_arg, report_count};
use crate::command::Command;

/// Applies up to `--number` pending migrations; `0` applies all of them.
pub struct UpCommand;

#[async_trait]
impl Command for UpCommand {
    fn name(&self) -> &'static str {
        "up"
    }

    fn help(&self) -> &'static str {
        "Apply migrations forward a number of steps"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(number_arg("Apply N up migrations (0 applies all pending)"))
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Result<(), ApplyError> {
        let steps = number(matches);
        if steps == 0 {
            println!("Attempting to apply all pending migrations...");
        } else {
            println!("Attempting to apply {steps} migrations...");
        }
        report_count(apply::up(settings, steps, cancel).await)
    }
}
