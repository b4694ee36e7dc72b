//! # Metrics Server
//!
//! An `axum` server with two routes: a small HTML landing page at `/` and the
//! scrape endpoint at the configured metrics path. Every request to the scrape
//! endpoint triggers one collection cycle; the response body is the replication
//! samples followed by the internal metrics, if those are enabled.
//!
//! The server stops when the shutdown signal changes.

use crate::exporter::ReplicationExporter;
use crate::internal_metrics::Metrics;
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
struct ServerState {
    exporter: Arc<ReplicationExporter>,
    internal: Option<PrometheusHandle>,
    metrics: Arc<Metrics>,
}

/// A server that exposes the replication metrics to a Prometheus scraper.
pub struct MetricsServer {
    listener: TcpListener,
    metrics_path: String,
    state: ServerState,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// Creates a new `MetricsServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `metrics_path` - The route serving the scrape endpoint.
    /// * `exporter` - Runs one collection cycle per scrape.
    /// * `internal` - Renders the internal metrics, when enabled.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        metrics_path: String,
        exporter: Arc<ReplicationExporter>,
        internal: Option<PrometheusHandle>,
        metrics: Arc<Metrics>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            metrics_path,
            state: ServerState {
                exporter,
                internal,
                metrics,
            },
            shutdown_rx,
        }
    }

    fn router(metrics_path: &str, state: ServerState) -> Router {
        let landing = landing_page(metrics_path);
        Router::new()
            .route("/", get(move || async move { Html(landing) }))
            .route(metrics_path, get(scrape))
            .with_state(state)
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let app = Self::router(&self.metrics_path, self.state);
        let listener = self.listener;
        let mut shutdown_rx = self.shutdown_rx;

        async move {
            let shutdown = async move {
                shutdown_rx.changed().await.ok();
                trace!("Metrics server received shutdown signal.");
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Metrics server error: {}", e);
            }
            trace!("Metrics server task finished.");
        }
    }
}

async fn scrape(State(state): State<ServerState>) -> impl IntoResponse {
    let started = Instant::now();
    let mut body = state.exporter.render().await;
    state
        .metrics
        .scrape_duration_seconds
        .record(started.elapsed().as_secs_f64());

    if let Some(handle) = &state.internal {
        append_exposition(&mut body, &handle.render());
    }
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

/// Appends a second exposition block, keeping its first line on a line of its own.
fn append_exposition(body: &mut String, block: &str) {
    if block.is_empty() {
        return;
    }
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(block);
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html>\n\
         <head><title>Github Replication Exporter</title></head>\n\
         <body>\n\
         <h1>Github Replication Exporter</h1>\n\
         <p><a href='{path}'>Metrics</a></p>\n\
         <h2>Build</h2>\n\
         <p>{version}</p>\n\
         </body>\n\
         </html>\n",
        path = metrics_path,
        version = env!("CARGO_PKG_VERSION"),
    )
}
