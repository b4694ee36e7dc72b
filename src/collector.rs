//! Single-flight collection of the raw status report.
//!
//! Scrapes may arrive concurrently, but the status utility is expensive, so at
//! most one invocation runs at any time. A scrape that finds an invocation in
//! flight does not wait for it: it returns the last stored report straight
//! away. There is no queueing and no retry.

use crate::core::{Role, StatusSource};
use crate::internal_metrics::Metrics;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace};

/// The result of one `collect` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// `false` only when this call invoked the utility and it failed.
    pub up: bool,
    /// The current raw status report (possibly stale, possibly empty).
    pub report: Arc<Vec<u8>>,
    /// The lifetime failure total, present only when this call failed.
    pub scrape_errors: Option<u64>,
}

/// Releases the in-flight flag when dropped, so every exit path (including a
/// cancelled scrape future) frees the guard.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Guards invocations of the status utility and keeps the last good report.
pub struct SingleFlightCollector {
    source: Arc<dyn StatusSource>,
    in_flight: AtomicBool,
    last_report: ArcSwap<Vec<u8>>,
    scrape_errors: AtomicU64,
    metrics: Arc<Metrics>,
}

impl SingleFlightCollector {
    pub fn new(source: Arc<dyn StatusSource>, metrics: Arc<Metrics>) -> Self {
        Self {
            source,
            in_flight: AtomicBool::new(false),
            last_report: ArcSwap::from_pointee(Vec::new()),
            scrape_errors: AtomicU64::new(0),
            metrics,
        }
    }

    /// Collects the current raw report for a node holding `role`.
    ///
    /// Only a replica ever invokes the utility. A failed invocation leaves the
    /// stored report untouched and bumps the error total; it is never fatal.
    pub async fn collect(&self, role: Role) -> Collection {
        let Some(_guard) = FlightGuard::try_acquire(&self.in_flight) else {
            trace!("Status invocation already in flight, serving last report");
            self.metrics.status_invocations_skipped.increment(1);
            return self.current(true, None);
        };

        if role != Role::Replica {
            return self.current(true, None);
        }

        let started = Instant::now();
        let result = self.source.report_status().await;
        self.metrics
            .status_invocation_duration_seconds
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(report) => {
                debug!(bytes = report.len(), "Stored new status report");
                self.metrics.status_invocations_succeeded.increment(1);
                self.last_report.store(Arc::new(report));
                self.current(true, None)
            }
            Err(e) => {
                let total = self.scrape_errors.fetch_add(1, Ordering::AcqRel) + 1;
                self.metrics.status_invocations_failed.increment(1);
                error!(error = %e, scrape_errors = total, "Scrape error");
                self.current(false, Some(total))
            }
        }
    }

    /// The lifetime number of failed invocations.
    pub fn scrape_errors(&self) -> u64 {
        self.scrape_errors.load(Ordering::Acquire)
    }

    /// The currently stored raw report.
    pub fn last_report(&self) -> Arc<Vec<u8>> {
        self.last_report.load_full()
    }

    fn current(&self, up: bool, scrape_errors: Option<u64>) -> Collection {
        Collection {
            up,
            report: self.last_report(),
            scrape_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_utils::FakeStatusSource;
    use futures::future::join_all;
    use std::time::Duration;
    use tokio::sync::{mpsc, Barrier};

    fn collector_for(source: Arc<FakeStatusSource>) -> SingleFlightCollector {
        SingleFlightCollector::new(source, Arc::new(Metrics::disabled()))
    }

    #[tokio::test]
    async fn test_successful_invocation_stores_report() {
        let source = Arc::new(FakeStatusSource::new());
        source.push_report("OK: mysql\n");
        let collector = collector_for(source.clone());

        let collection = collector.collect(Role::Replica).await;
        assert!(collection.up);
        assert_eq!(collection.report.as_slice(), b"OK: mysql\n");
        assert_eq!(collection.scrape_errors, None);
        assert_eq!(source.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_report_and_counts_once() {
        let source = Arc::new(FakeStatusSource::new());
        source.push_report("OK: mysql\nOK: redis\n");
        source.push_failure("replication check failed");
        source.push_report("FAIL: mysql\n");
        let collector = collector_for(source.clone());

        collector.collect(Role::Replica).await;

        let failed = collector.collect(Role::Replica).await;
        assert!(!failed.up);
        assert_eq!(failed.report.as_slice(), b"OK: mysql\nOK: redis\n");
        assert_eq!(failed.scrape_errors, Some(1));
        assert_eq!(collector.scrape_errors(), 1);

        let recovered = collector.collect(Role::Replica).await;
        assert!(recovered.up);
        assert_eq!(recovered.report.as_slice(), b"FAIL: mysql\n");
        assert_eq!(recovered.scrape_errors, None);
        assert_eq!(collector.scrape_errors(), 1);
    }

    #[tokio::test]
    async fn test_failure_before_any_success_serves_empty_report() {
        let source = Arc::new(FakeStatusSource::new());
        source.push_failure("boom");
        let collector = collector_for(source);

        let collection = collector.collect(Role::Replica).await;
        assert!(!collection.up);
        assert!(collection.report.is_empty());
    }

    #[tokio::test]
    async fn test_guard_is_released_after_failure() {
        let source = Arc::new(FakeStatusSource::new());
        source.push_failure("boom");
        source.push_failure("boom again");
        let collector = collector_for(source.clone());

        collector.collect(Role::Replica).await;
        collector.collect(Role::Replica).await;
        assert_eq!(source.status_calls(), 2);
        assert_eq!(collector.scrape_errors(), 2);
    }

    #[tokio::test]
    async fn test_primary_never_invokes_the_utility() {
        let source = Arc::new(FakeStatusSource::with_role("primary\n"));
        source.push_report("OK: mysql\n");
        let collector = collector_for(source.clone());

        for _ in 0..3 {
            let collection = collector.collect(Role::Primary).await;
            assert!(collection.up);
            assert!(collection.report.is_empty());
        }
        assert_eq!(source.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_scrapes_share_one_invocation() {
        let (source, gate) = FakeStatusSource::new().gated();
        let source = Arc::new(source);
        source.push_report("OK: mysql\n");
        let collector = Arc::new(collector_for(source.clone()));

        let leader = tokio::spawn({
            let collector = collector.clone();
            async move { collector.collect(Role::Replica).await }
        });
        source.invocation_started().await;

        // Everyone else must return the prior (empty) report without waiting
        // on the in-flight invocation.
        let followers = join_all((0..8).map(|_| collector.collect(Role::Replica)));
        let followers = tokio::time::timeout(Duration::from_secs(1), followers)
            .await
            .expect("followers blocked on the in-flight invocation");
        for collection in followers {
            assert!(collection.up);
            assert!(collection.report.is_empty());
            assert_eq!(collection.scrape_errors, None);
        }

        gate.add_permits(1);
        let lead = leader.await.unwrap();
        assert_eq!(lead.report.as_slice(), b"OK: mysql\n");
        assert_eq!(source.status_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_simultaneous_scrapes_race_for_a_single_invocation() {
        const SCRAPERS: usize = 16;

        let (source, gate) = FakeStatusSource::new().gated();
        let source = Arc::new(source);
        source.push_report("OK: mysql\n");
        let collector = Arc::new(collector_for(source.clone()));
        let barrier = Arc::new(Barrier::new(SCRAPERS));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = (0..SCRAPERS)
            .map(|_| {
                let collector = collector.clone();
                let barrier = barrier.clone();
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    let collection = collector.collect(Role::Replica).await;
                    let _ = done_tx.send(());
                    collection
                })
            })
            .collect();

        // The winner stays parked on the gate until every loser has returned.
        tokio::time::timeout(Duration::from_secs(5), async {
            source.invocation_started().await;
            for _ in 0..SCRAPERS - 1 {
                done_rx.recv().await.unwrap();
            }
        })
        .await
        .expect("losing scrapes blocked on the in-flight invocation");
        assert_eq!(source.status_calls(), 1);

        gate.add_permits(1);
        let collections: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();

        assert_eq!(source.status_calls(), 1);
        assert!(collections.iter().all(|c| c.up && c.scrape_errors.is_none()));
        let fresh = collections
            .iter()
            .filter(|c| c.report.as_slice() == b"OK: mysql\n")
            .count();
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn test_cancelled_scrape_releases_the_guard() {
        let (source, gate) = FakeStatusSource::new().gated();
        let source = Arc::new(source);
        source.push_report("OK: first\n");
        source.push_report("OK: second\n");
        let collector = Arc::new(collector_for(source.clone()));

        let pending = tokio::spawn({
            let collector = collector.clone();
            async move { collector.collect(Role::Replica).await }
        });
        source.invocation_started().await;
        pending.abort();
        let _ = pending.await;

        gate.add_permits(1);
        let collection = collector.collect(Role::Replica).await;
        assert!(collection.up);
        assert_eq!(source.status_calls(), 2);
    }
}
