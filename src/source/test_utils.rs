use crate::core::{StatusError, StatusSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

const FAKE_PATH: &str = "fake-ghe-repl-status";

fn failure(message: &str) -> StatusError {
    StatusError::Failed {
        path: PathBuf::from(FAKE_PATH),
        status: "exit status: 1".to_string(),
        stderr: message.to_string(),
    }
}

/// Fake status utility for testing
pub struct FakeStatusSource {
    role: Mutex<Result<Vec<u8>, String>>,
    // The front of the queue is the next status response.
    statuses: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    role_calls: AtomicUsize,
    status_calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    entered: Notify,
}

impl FakeStatusSource {
    pub fn new() -> Self {
        Self::with_role("replica\n")
    }

    /// Creates a fake whose role query prints `output`.
    pub fn with_role(output: &str) -> Self {
        Self {
            role: Mutex::new(Ok(output.as_bytes().to_vec())),
            statuses: Mutex::new(VecDeque::new()),
            role_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            gate: None,
            entered: Notify::new(),
        }
    }

    /// Creates a fake whose role query fails.
    pub fn with_role_error(message: &str) -> Self {
        let fake = Self::with_role("");
        *fake.role.lock().unwrap() = Err(message.to_string());
        fake
    }

    /// Makes every status invocation wait for a permit on the returned
    /// semaphore before completing.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Queue a successful status report
    pub fn push_report(&self, report: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Ok(report.as_bytes().to_vec()));
    }

    /// Queue a failed status invocation
    pub fn push_failure(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn role_calls(&self) -> usize {
        self.role_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Resolves once a status invocation has started.
    pub async fn invocation_started(&self) {
        self.entered.notified().await;
    }
}

impl Default for FakeStatusSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusSource for FakeStatusSource {
    async fn report_role(&self) -> Result<Vec<u8>, StatusError> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        self.role.lock().unwrap().clone().map_err(|e| failure(&e))
    }

    async fn report_status(&self) -> Result<Vec<u8>, StatusError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("fake status gate closed")
                .forget();
        }

        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(failure(&message)),
            None => Err(failure("no more status responses configured")),
        }
    }
}
