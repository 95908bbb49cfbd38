//! ES Tool Main Entry Point
//!
//! Parses the command line, connects to the cluster once and runs a single
//! subcommand. Ctrl-C cancels a running dump at the next page boundary.

use std::env;
use std::io::{self, BufWriter};

use clap::Parser;
use dotenv::dotenv;
use es_tool::cli::Cli;
use es_tool::{commands, Dependencies, ToolError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging. Logs go to stderr; stdout carries results.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("es_tool=info,es_repository=info"));

    let json_logs = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .pretty()
                    .with_writer(io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), ToolError> {
    // Load environment variables from .env file before flags read them
    dotenv().ok();

    let cli = Cli::parse();
    init_tracing();

    info!(
        service_name = "es-tool",
        service_version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "Starting"
    );

    let deps = match Dependencies::new(&cli.connection).await {
        Ok(deps) => deps,
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next page boundary");
            interrupt.cancel();
        }
    });

    let mut out = BufWriter::new(io::stdout());
    match commands::run(deps.client.as_ref(), &cli.command, &cancel, &mut out).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => {
            warn!("Command cancelled");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            Err(e)
        }
    }
}
