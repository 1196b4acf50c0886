//! flambda-switch CLI

use std::future::Future;
use std::process::ExitCode;

use clap::Parser;
use flambda_switch_core::Reporter;
use tracing_subscriber::EnvFilter;

use flambda_switch_cli::Cli;
use flambda_switch_cli::cmd;
use flambda_switch_cli::ui::Output;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(cli.quiet);

    // Registered up front so an interrupt at the first prompt is not lost.
    let interrupted = match interrupt() {
        Ok(signal) => signal,
        Err(e) => {
            output.error(&format!("Error: failed to install interrupt handler: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let task = tokio::spawn(cmd::create::create(cli, output.clone()));

    tokio::select! {
        joined = task => match joined {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                output.error(&format!("Error: {e:#}"));
                ExitCode::FAILURE
            }
            Err(e) => {
                output.error(&format!("Error: {e}"));
                ExitCode::FAILURE
            }
        },
        () = interrupted => {
            println!();
            output.error("Operation cancelled by user.");
            // A blocking stage may still be parked in a child's wait() or on
            // stdin; don't join it.
            std::process::exit(1);
        }
    }
}

/// Resolves on the first Ctrl-C. The handler is installed before this
/// returns rather than on first poll.
#[cfg(unix)]
fn interrupt() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(async move {
        sigint.recv().await;
    })
}

#[cfg(not(unix))]
fn interrupt() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
}
