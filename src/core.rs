//! Core domain types and service traits for the replication exporter
//!
//! This module defines the fundamental data structures and the trait contract
//! for the external status utility that every other component builds on.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// The role a node holds in the replication topology.
///
/// Resolved once at startup and never changed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Primary,
    Replica,
}

impl Role {
    /// The label value used for this role in exported metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Role::Primary),
            "replica" => Ok(Role::Replica),
            other => Err(StatusError::UnknownRole(other.to_string())),
        }
    }
}

/// The health of one replicated service, as reported by a single status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// The service name (second token of the status line).
    pub service: String,
    /// `true` when the line was tagged `OK:`.
    pub healthy: bool,
}

impl ServiceStatus {
    pub fn new(service: impl Into<String>, healthy: bool) -> Self {
        Self {
            service: service.into(),
            healthy,
        }
    }
}

/// Everything one scrape cycle hands to the metric projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutcome {
    pub role: Role,
    /// `false` only when this cycle's invocation of the status utility failed.
    pub up: bool,
    /// Parsed entries, in the order the utility reported them.
    pub entries: Vec<ServiceStatus>,
    /// The lifetime scrape-error total. Present only when this cycle failed.
    pub scrape_errors: Option<u64>,
}

/// Errors raised at the process boundary with the status utility.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("status utility not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to execute {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited unsuccessfully ({status}): {stderr}", .path.display())]
    Failed {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("status utility reported an unknown role: {0:?}")]
    UnknownRole(String),
}

impl StatusError {
    /// Returns `true` when the utility was found but could not be run to a
    /// successful exit.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, StatusError::Spawn { .. } | StatusError::Failed { .. })
    }
}

/// The external source of replication status.
///
/// The production implementation spawns `ghe-repl-status`; tests substitute
/// an in-memory fake.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Runs the utility in role-report mode and returns its raw stdout.
    async fn report_role(&self) -> Result<Vec<u8>, StatusError>;

    /// Runs the utility with no arguments and returns its raw stdout.
    async fn report_status(&self) -> Result<Vec<u8>, StatusError>;
}
