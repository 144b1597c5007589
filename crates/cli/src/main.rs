//! noderig CLI
//!
//! Provisions pinned Node.js runtimes, installs global npm packages into them
//! and runs Jasmine suites, reporting one outcome per spec.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod shutdown;
mod tracing;

use crate::commands::{Command, CommandExecutor};
use crate::tracing::TracingConfig;
use ::tracing::Instrument;
use std::process::ExitCode;

/// Exit code when tests failed or reporting was cancelled
const EXIT_TESTS_FAILED: u8 = 1;
/// Exit code for errors
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // NOTE: tracing may be unusable during a panic, so this goes straight to stderr
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    match run_main().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_TESTS_FAILED),
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run_main() -> miette::Result<bool> {
    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.tracing_format(),
        level: cli.level.into(),
        filter: cli.log_filter,
    };
    crate::tracing::init_tracing(tracing_config)?;

    let command: Command = cli.command.into();
    execute_command(command).await
}

async fn execute_command(command: Command) -> miette::Result<bool> {
    let span = ::tracing::info_span!(
        "command",
        command = command.name(),
        correlation_id = %crate::tracing::correlation_id(),
    );
    let shutdown = shutdown::install_signal_handlers();
    let executor = CommandExecutor::new(shutdown);

    let output = executor.execute(command).instrument(span).await?;
    if let Some(stdout) = output.stdout
        && !stdout.is_empty()
    {
        println!("{stdout}");
    }
    Ok(output.success)
}
