//! Command-Line Interface (CLI) argument parsing.
//!
//! The flags mirror the configuration keys and take precedence over the
//! TOML file and environment variables when present.

use clap::Parser;
use figment::{
    providers::Serialized,
    value::{Dict, Map},
    Error, Figment, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Prometheus exporter for GitHub Enterprise replication status.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on for web interface and telemetry.
    #[arg(long, value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics.
    #[arg(long, value_name = "PATH")]
    pub metrics_path: Option<String>,

    /// Path where ghe-repl-status can be found.
    #[arg(long, value_name = "FILE")]
    pub ghe_repl_status_path: Option<PathBuf>,

    /// Log level (trace/debug/info/warn/error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        // Only flags that were actually given override lower layers.
        let mut figment = Figment::new();

        if let Some(address) = &self.listen_address {
            figment = figment.merge(Serialized::default("server.listen_address", address));
        }
        if let Some(path) = &self.metrics_path {
            figment = figment.merge(Serialized::default("server.metrics_path", path));
        }
        if let Some(path) = &self.ghe_repl_status_path {
            figment = figment.merge(Serialized::default("status.utility_path", path));
        }
        if let Some(level) = &self.log_level {
            figment = figment.merge(Serialized::default("log_level", level));
        }

        figment.data()
    }
}
