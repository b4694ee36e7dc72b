//! The process boundary with `ghe-repl-status`.

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::core::{StatusError, StatusSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, trace};

/// The argument that switches the utility into role-report mode.
pub const ROLE_FLAG: &str = "-r";

/// Runs the status utility as a child process.
#[derive(Debug, Clone)]
pub struct ReplStatusCommand {
    path: PathBuf,
}

impl ReplStatusCommand {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, StatusError> {
        if tokio::fs::metadata(&self.path).await.is_err() {
            return Err(StatusError::NotFound(self.path.clone()));
        }

        trace!(path = %self.path.display(), ?args, "Spawning status utility");
        // The child dies with the scrape future, so a cancelled scrape can never
        // leave an invocation running behind a released guard.
        let output = Command::new(&self.path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| StatusError::Spawn {
                path: self.path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(StatusError::Failed {
                path: self.path.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            path = %self.path.display(),
            bytes = output.stdout.len(),
            "Status utility finished"
        );
        Ok(output.stdout)
    }
}

#[async_trait]
impl StatusSource for ReplStatusCommand {
    async fn report_role(&self) -> Result<Vec<u8>, StatusError> {
        self.run(&[ROLE_FLAG]).await
    }

    async fn report_status(&self) -> Result<Vec<u8>, StatusError> {
        self.run(&[]).await
    }
}
