use std::process::ExitCode;

use strata_cli::command::{self, CommandRegistry};
use strata_cli::commands::register_builtin_commands;
use strata_cli::{config, render_error};
use strata_core::logging::setup_logging;
use strata_core::ApplyError;
use strata_engine::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match command::selected(&matches).and_then(|(_, sub)| config::resolve(sub)) {
        Ok(settings) => settings,
        Err(e) => return fail(&ApplyError::from(e)),
    };
    setup_logging(&settings);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping before the next migration");
                cancel.cancel();
            }
        }
    });

    match registry.execute(&matches, &settings, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(err: &ApplyError) -> ExitCode {
    eprint!("{}", render_error(err));
    ExitCode::FAILURE
}
