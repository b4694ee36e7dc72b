//! ghe-repl-exporter - GitHub Enterprise replication status exporter
//!
//! Resolves the node role once, then serves the replication state of every
//! service reported by `ghe-repl-status` on each Prometheus scrape.

use anyhow::Result;
use clap::Parser;
use ghe_repl_exporter::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            // Logging is configured from the config, so fall back to defaults here.
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting github_replication_exporter, version: {}", env!("CARGO_PKG_VERSION"));
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    info!("Metrics Path: {}", config.server.metrics_path);
    info!("ghe-repl-status Path: {}", config.status.utility_path.display());
    info!("Ignored Markers: {:?}", config.status.ignore_markers);
    info!("Internal Metrics: {}", config.metrics.internal_metrics);
    info!("System Metrics: {}", config.metrics.system_metrics);
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = match App::builder(config).build(shutdown_rx).await {
        Ok(app) => app,
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received. Shutting down gracefully..."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("All tasks shut down. Exiting.");
    Ok(())
}
