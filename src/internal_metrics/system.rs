//! # System Metrics Collector
//!
//! Periodically samples the exporter's own CPU and resident memory through
//! `sysinfo` and records them as gauges in the internal recorder.

use std::time::Duration;
use sysinfo::System;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error};

const SYSTEM_METRICS_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

/// A collector for process-level resource metrics.
pub struct SystemCollector {
    system: System,
}

impl SystemCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Runs the collection loop until the shutdown signal fires or the
    /// process can no longer be observed.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = time::interval(SYSTEM_METRICS_COLLECTION_INTERVAL);
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                error!("Failed to get current PID: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("System collector received shutdown signal.");
                    break;
                }
                _ = interval.tick() => {}
            }

            self.system.refresh_cpu();
            if !self.system.refresh_process(pid) {
                error!(%pid, "Exporter process no longer found. System collector is stopping.");
                break;
            }
            if let Some(process) = self.system.process(pid) {
                metrics::gauge!("process_cpu_usage_percent").set(process.cpu_usage() as f64);
                metrics::gauge!("process_memory_usage_bytes").set(process.memory() as f64);
            }
        }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}
