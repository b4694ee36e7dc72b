//! ghe-repl-exporter - Prometheus exporter for GitHub Enterprise replication
//!
//! This library runs `ghe-repl-status` on scrape, parses its per-service
//! verdicts and republishes them as Prometheus metrics, with at most one
//! invocation of the utility in flight at any time.

pub mod app;
pub mod cli;
pub mod collector;
pub mod config;
pub mod core;
pub mod exporter;
pub mod internal_metrics;
pub mod parser;
pub mod projection;
pub mod role;
pub mod source;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
