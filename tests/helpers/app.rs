#![allow(dead_code)]
//! Test helpers for running the full application instance.

use anyhow::Result;
use ghe_repl_exporter::{
    app::AppBuilder, config::Config, core::Role, internal_metrics::Metrics,
    source::test_utils::FakeStatusSource,
};
use std::net::SocketAddr;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running instance of the application, serving on an ephemeral port.
#[derive(Debug)]
pub struct TestApp {
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: Option<JoinHandle<Result<()>>>,
    addr: SocketAddr,
    metrics_path: String,
    role: Role,
    client: reqwest::Client,
}

impl TestApp {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Performs one scrape and returns the response body.
    pub async fn scrape(&self) -> Result<String> {
        let response = self.get(&self.metrics_path).await?;
        Ok(response.error_for_status()?.text().await?)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("http://{}{}", self.addr, path);
        Ok(self.client.get(url).send().await?)
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the timeout.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .expect("Failed to send shutdown signal");

        if let Some(handle) = self.app_handle {
            match timeout(timeout_duration, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
            }
        } else {
            Ok(())
        }
    }
}

/// A builder for creating `TestApp` instances with specific configurations.
pub struct TestAppBuilder {
    pub config: Config,
    source: Arc<FakeStatusSource>,
    metrics: Option<Metrics>,
}

impl TestAppBuilder {
    pub fn new(source: Arc<FakeStatusSource>) -> Self {
        let mut config = Config::default();
        config.server.listen_address = "127.0.0.1:0".to_string();
        // The global recorder can only be installed once per test binary.
        config.metrics.internal_metrics = false;
        config.metrics.system_metrics = false;

        Self {
            config,
            source,
            metrics: None,
        }
    }

    pub fn with_config_modifier(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the application and spawns it on the current runtime.
    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics_path = self.config.server.metrics_path.clone();

        let mut builder = AppBuilder::new(self.config).source_override(self.source);
        if let Some(metrics) = self.metrics {
            builder = builder.metrics_override(metrics);
        }
        let app = builder.build(shutdown_rx).await?;
        let addr = app.listen_addr();
        let role = app.role();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            shutdown_tx,
            app_handle: Some(app_handle),
            addr,
            metrics_path,
            role,
            // No ambient proxy, and no idle connections to hold up graceful shutdown.
            client: reqwest::Client::builder()
                .no_proxy()
                .pool_max_idle_per_host(0)
                .build()?,
        })
    }
}

/// Returns the value of the first sample line for `name` that carries every
/// label in `labels`.
pub fn sample_value(body: &str, name: &str, labels: &[&str]) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.starts_with(&format!("{}{{", name)) || line.starts_with(&format!("{} ", name))
        })
        .find(|line| labels.iter().all(|l| line.contains(l)))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
