//! Maps a scrape outcome onto the metric samples handed to the registry.

use crate::core::{ScrapeOutcome, ServiceStatus};

/// Prefix shared by every exported metric name.
pub const NAMESPACE: &str = "github_replication_exporter";

pub const UP: &str = "github_replication_exporter_up";
pub const REPLICATED_SERVICE: &str = "github_replication_exporter_replicated_service";
pub const STATUS_SCRAPE_ERROR_TOTAL: &str = "github_replication_exporter_status_scrape_error_total";

/// A sample's value, typed by metric kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Gauge(f64),
    Counter(u64),
}

/// One labeled metric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: SampleValue,
}

/// Projects `outcome` into samples.
///
/// Always emits `up`; emits one `replicated_service` gauge per reported
/// service; emits the error counter only when this cycle's collection failed.
/// Services missing from the report produce no sample at all. A service that
/// appears on several lines is healthy only if every one of its lines is, and
/// keeps the position of its first line.
pub fn project(outcome: &ScrapeOutcome) -> Vec<Sample> {
    let role = outcome.role.as_str();
    let mut samples = Vec::with_capacity(outcome.entries.len() + 2);

    samples.push(Sample {
        name: UP,
        help: "Was the last query of Github Replication successful.",
        labels: vec![("role", role.to_string())],
        value: SampleValue::Gauge(if outcome.up { 1.0 } else { 0.0 }),
    });

    if let Some(total) = outcome.scrape_errors {
        samples.push(Sample {
            name: STATUS_SCRAPE_ERROR_TOTAL,
            help: "Total number of error while scraping.",
            labels: Vec::new(),
            value: SampleValue::Counter(total),
        });
    }

    samples.extend(merge_services(&outcome.entries).into_iter().map(|(service, healthy)| {
        Sample {
            name: REPLICATED_SERVICE,
            help: "Replicated service status",
            labels: vec![("service", service.to_string()), ("role", role.to_string())],
            value: SampleValue::Gauge(if healthy { 1.0 } else { 0.0 }),
        }
    }));

    samples
}

/// Folds repeated service names into one verdict each, in first-seen order.
fn merge_services(entries: &[ServiceStatus]) -> Vec<(&str, bool)> {
    let mut merged: Vec<(&str, bool)> = Vec::with_capacity(entries.len());
    for entry in entries {
        match merged.iter_mut().find(|(service, _)| *service == entry.service) {
            Some((_, healthy)) => *healthy &= entry.healthy,
            None => merged.push((entry.service.as_str(), entry.healthy)),
        }
    }
    merged
}
