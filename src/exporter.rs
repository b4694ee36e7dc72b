//! One scrape cycle: collect, parse, project, encode.

use crate::collector::SingleFlightCollector;
use crate::core::{Role, ScrapeOutcome};
use crate::parser::StatusParser;
use crate::projection::{project, Sample, SampleValue};
use metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Ties the resolved role to the collector and parser.
pub struct ReplicationExporter {
    role: Role,
    collector: Arc<SingleFlightCollector>,
    parser: StatusParser,
}

impl ReplicationExporter {
    pub fn new(role: Role, collector: Arc<SingleFlightCollector>, parser: StatusParser) -> Self {
        Self {
            role,
            collector,
            parser,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Runs one collection cycle and parses whatever report is current.
    #[instrument(skip_all, fields(role = %self.role))]
    pub async fn scrape(&self) -> ScrapeOutcome {
        let collection = self.collector.collect(self.role).await;
        let entries = self.parser.parse(&collection.report);
        debug!(entries = entries.len(), up = collection.up, "Scrape collected");

        ScrapeOutcome {
            role: self.role,
            up: collection.up,
            entries,
            scrape_errors: collection.scrape_errors,
        }
    }

    /// Runs one cycle and returns the Prometheus text exposition of it.
    pub async fn render(&self) -> String {
        let outcome = self.scrape().await;
        encode(&project(&outcome))
    }
}

/// Encodes samples in the Prometheus text format.
///
/// A fresh recorder is built for every call, so a sample that is not in
/// `samples` is absent from the output rather than carried over from an
/// earlier scrape.
pub fn encode(samples: &[Sample]) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        for sample in samples {
            let labels: Vec<Label> = sample
                .labels
                .iter()
                .map(|(key, value)| Label::new(*key, value.clone()))
                .collect();
            match sample.value {
                SampleValue::Gauge(value) => {
                    metrics::describe_gauge!(sample.name, sample.help);
                    metrics::gauge!(sample.name, labels).set(value);
                }
                SampleValue::Counter(value) => {
                    metrics::describe_counter!(sample.name, sample.help);
                    metrics::counter!(sample.name, labels).absolute(value);
                }
            }
        }
    });

    handle.render()
}
