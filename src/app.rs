//! The main application logic, decoupled from the entry point.

use crate::{
    collector::SingleFlightCollector,
    config::Config,
    core::{Role, StatusSource},
    exporter::ReplicationExporter,
    internal_metrics::{server::MetricsServer, Metrics, MetricsBuilder},
    parser::StatusParser,
    role::resolve_role,
    source::ReplStatusCommand,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    listen_addr: SocketAddr,
    role: Role,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the HTTP server actually bound to.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap the status utility and the internal metrics for fakes.
pub struct AppBuilder {
    config: Config,
    source_override: Option<Arc<dyn StatusSource>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source_override: None,
            metrics_override: None,
        }
    }

    /// Overrides the status utility for testing.
    pub fn source_override(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.source_override = Some(source);
        self
    }

    /// Overrides the internal metrics for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Resolves the node role, binds the listener and spawns the server.
    ///
    /// Fails if the role cannot be resolved or the listener cannot be bound;
    /// no scrape is ever served without a known role.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        config.validate()?;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Resolve the node role
        // =========================================================================
        let source = match self.source_override {
            Some(source) => source,
            None => {
                debug!(path = %config.status.utility_path.display(), "Using ghe-repl-status");
                Arc::new(ReplStatusCommand::new(&config.status.utility_path)) as Arc<dyn StatusSource>
            }
        };
        let role = resolve_role(&*source)
            .await
            .context("failed to resolve node role")?;

        // =========================================================================
        // 2. Initialize internal metrics
        // =========================================================================
        let (metrics, internal_handle) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(&task_manager),
        };
        let metrics = Arc::new(metrics);

        // =========================================================================
        // 3. Build the collection pipeline
        // =========================================================================
        let collector = Arc::new(SingleFlightCollector::new(source, metrics.clone()));
        let parser = StatusParser::new(config.status.ignore_markers.iter().cloned());
        let exporter = Arc::new(ReplicationExporter::new(role, collector, parser));

        // =========================================================================
        // 4. Bind and spawn the HTTP server
        // =========================================================================
        let addr = config.server.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        let listen_addr = listener.local_addr()?;

        let server = MetricsServer::new(
            listener,
            config.server.metrics_path.clone(),
            exporter,
            internal_handle,
            metrics,
            task_manager.get_shutdown_rx(),
        );
        task_manager.spawn("MetricsServer", server.run());

        info!(
            %role,
            address = %listen_addr,
            path = %config.server.metrics_path,
            "Replication exporter listening"
        );

        Ok(App {
            task_manager,
            listen_addr,
            role,
        })
    }
}
