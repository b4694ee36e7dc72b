//! # Internal Metrics Module
//!
//! The exporter's own health, as opposed to the replication state it
//! republishes. These metrics live in a process-wide Prometheus recorder and
//! are appended to every scrape response when enabled.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: Installs the global Prometheus recorder, spawns the
//!   `SystemCollector` when configured, and constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A lightweight, cloneable set of handles the collector and
//!   the HTTP layer update directly.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that serves the landing page and the scrape endpoint.
//!
//! - **`SystemCollector`**: (Defined in `system.rs`) A background task that
//!   periodically records process CPU and memory usage.

use crate::config::MetricsConfig;
use crate::internal_metrics::system::SystemCollector;
use crate::projection::NAMESPACE;
use crate::task_manager::TaskManager;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::error;

pub mod server;
pub mod system;

const INVOCATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

fn metric_name(suffix: &str) -> String {
    format!("{}_{}", NAMESPACE, suffix)
}

/// The public API for the internal metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub status_invocations_succeeded: Counter,
    pub status_invocations_failed: Counter,
    pub status_invocations_skipped: Counter,
    pub status_invocation_duration_seconds: Histogram,
    pub scrape_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// internal metrics with the global recorder.
    pub fn new() -> Self {
        let invocations = metric_name("status_invocations_total");
        let skipped = metric_name("status_invocations_skipped_total");
        let invocation_duration = metric_name("status_invocation_duration_seconds");
        let scrape_duration = metric_name("scrape_duration_seconds");

        metrics::describe_counter!(invocations.clone(), Unit::Count, "Total number of status utility invocations, labeled by outcome.");
        metrics::describe_counter!(skipped.clone(), Unit::Count, "Total number of scrapes that reused the last report because an invocation was already in flight.");
        metrics::describe_histogram!(invocation_duration.clone(), Unit::Seconds, "Wall-clock time of each status utility invocation.");
        metrics::describe_histogram!(scrape_duration.clone(), Unit::Seconds, "Time taken to collect and encode one scrape.");
        metrics::describe_gauge!("process_cpu_usage_percent", Unit::Percent, "The percentage of CPU time the exporter process is currently using.");
        metrics::describe_gauge!("process_memory_usage_bytes", Unit::Bytes, "Resident set size of the exporter process, in bytes.");

        Self {
            status_invocations_succeeded: metrics::counter!(invocations.clone(), "outcome" => "success"),
            status_invocations_failed: metrics::counter!(invocations, "outcome" => "failure"),
            status_invocations_skipped: metrics::counter!(skipped),
            status_invocation_duration_seconds: metrics::histogram!(invocation_duration),
            scrape_duration_seconds: metrics::histogram!(scrape_duration),
        }
    }

    /// Creates a `Metrics` instance whose handles record nothing.
    /// Used when internal metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            status_invocations_succeeded: Counter::noop(),
            status_invocations_failed: Counter::noop(),
            status_invocations_skipped: Counter::noop(),
            status_invocation_duration_seconds: Histogram::noop(),
            scrape_duration_seconds: Histogram::noop(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the internal metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the global Prometheus recorder and returns the `Metrics`
    /// handle together with the handle used to render it.
    ///
    /// If internal metrics are disabled, or the recorder cannot be installed,
    /// a disabled `Metrics` instance and `None` are returned. Neither case
    /// stops the exporter from serving replication metrics.
    pub fn build(self, task_manager: &TaskManager) -> (Metrics, Option<PrometheusHandle>) {
        if !self.config.internal_metrics {
            return (Metrics::disabled(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            INVOCATION_BUCKETS,
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Failed to configure internal metrics buckets: {}", e);
                return (Metrics::disabled(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::disabled(), None);
        }

        let metrics = Metrics::new();

        if self.config.system_metrics {
            let system_collector = SystemCollector::new();
            task_manager.spawn("SystemCollector", system_collector.run(task_manager.get_shutdown_rx()));
        }

        (metrics, Some(handle))
    }
}
