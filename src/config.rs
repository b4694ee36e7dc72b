//! Configuration management for the exporter
//!
//! This module defines the main `Config` struct and its sections. It uses the
//! `figment` crate to layer built-in defaults, an optional TOML file,
//! environment variables and command-line flags, in that order.

use crate::cli::Cli;
use anyhow::{anyhow, bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

/// Prefix for environment overrides, e.g. `GHE_REPL_EXPORTER_SERVER__LISTEN_ADDRESS`.
pub const ENV_PREFIX: &str = "GHE_REPL_EXPORTER_";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Status utility settings.
    pub status: StatusConfig,
    /// The exporter's own metrics.
    pub metrics: MetricsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `0.0.0.0:9169`. A bare `:9169` binds all
    /// interfaces.
    pub listen_address: String,
    /// Path under which metrics are served.
    pub metrics_path: String,
}

/// Status utility settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatusConfig {
    /// Path to `ghe-repl-status`.
    pub utility_path: PathBuf,
    /// First tokens of report lines to skip.
    pub ignore_markers: Vec<String>,
}

/// Settings for the exporter's own metrics.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    /// Append internal metrics (invocation counts and latencies) to each scrape.
    pub internal_metrics: bool,
    /// Also sample process CPU and memory.
    pub system_metrics: bool,
}

impl ServerConfig {
    /// Parses the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let address = if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        };
        address
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.listen_address))
    }
}

impl Config {
    /// Loads the configuration, layering the file named by `--config` (if any),
    /// `GHE_REPL_EXPORTER_*` environment variables and the remaining CLI flags
    /// over the defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            if !path.exists() {
                bail!("configuration file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        let mut config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(cli.clone())
            .extract()
            .context("failed to load configuration")?;
        if config.log_level.eq_ignore_ascii_case("warning") {
            config.log_level = "warn".to_string();
        }
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the exporter cannot start with.
    pub fn validate(&self) -> Result<()> {
        LevelFilter::from_str(&self.log_level).map_err(|_| {
            anyhow!(
                "invalid log level '{}', expected one of trace/debug/info/warn/error/off",
                self.log_level
            )
        })?;
        self.server.socket_addr()?;
        let path = &self.server.metrics_path;
        if !path.starts_with('/') || path == "/" {
            bail!("metrics path must start with '/' and must not be '/', got '{}'", path);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: "0.0.0.0:9169".to_string(),
                metrics_path: "/metrics".to_string(),
            },
            status: StatusConfig {
                utility_path: PathBuf::from("/usr/local/bin/ghe-repl-status"),
                ignore_markers: crate::parser::DEFAULT_IGNORE_MARKERS
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
            },
            metrics: MetricsConfig {
                internal_metrics: true,
                system_metrics: true,
            },
        }
    }
}
