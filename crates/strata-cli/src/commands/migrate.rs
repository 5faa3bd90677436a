//! The `migrate` command: apply every pending migration.

use async_trait::async_trait;
use strata_core::{ApplyError, Settings};
use strata_engine::{apply, CancellationToken};

use crate::command::Command;

/// Applies all pending migrations.
pub struct MigrateCommand;

#[async_trait]
impl Command for MigrateCommand {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn help(&self) -> &'static str {
        "Apply all migrations"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Result<(), ApplyError> {
        println!("Applying all pending migrations...");
        apply::migrate(settings, cancel).await?;
        println!("Pending migrations applied.");
        Ok(())
    }
}
