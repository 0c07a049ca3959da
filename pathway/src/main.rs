#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use anyhow::Context;
use args::Args;
use clap::Parser;
use pathway_config::Config;
use pathway_server::Server;
use tokio_util::sync::CancellationToken;

const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)
        .with_context(|| format!("could not start with config {}", args.config.display()))?;
    if let Some(listen) = args.listen {
        config.server.listen_address = Some(listen);
    }

    // Initialize telemetry
    let log_filter = args
        .log_filter
        .or_else(|| config.telemetry.as_ref().and_then(|t| t.log_filter.clone()))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());
    let _telemetry_guard = pathway_telemetry::init(config.telemetry.as_ref(), &log_filter)?;

    tracing::info!(
        config_path = %args.config.display(),
        models = config.models.len(),
        "starting pathway"
    );

    // Set up graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    // Build and run server
    let server = Server::new(&config, &shutdown);
    server.serve(shutdown).await?;

    tracing::info!("pathway stopped");
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
