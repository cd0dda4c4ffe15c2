//! tgbridge entry point.
//!
//! Binary name: `tgbridge`
//!
//! Loads `.env`, parses options, wires the services, then polls Telegram
//! until SIGINT/SIGTERM and drains in-flight answers before exiting.

mod cli;
mod runner;
mod state;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tgbridge_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};

use cli::Cli;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        default_filter: filter_for_verbosity(cli.verbose).to_string(),
        json: cli.log_json,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))?;

    let result = serve(cli).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "tgbridge stopped with an error");
    }

    shutdown_tracing();
    result
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(&cli).await?;
    info!(
        username = %state.bot_username,
        allowed_users = state.config.allowed_user_ids.len(),
        edit_interval_ms = state.config.edit_rate_limit.as_millis() as u64,
        "Started Telegram bot! Message @{} to start.",
        state.bot_username
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping poller");
        signal_cancel.cancel();
    });

    let report = runner::run(&state, cancel).await;
    info!(
        handled = report.handled,
        abandoned = report.abandoned,
        chats = state.dispatcher.store().len(),
        "tgbridge stopped"
    );
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
