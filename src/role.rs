//! Startup role resolution.
//!
//! The node's role gates whether service-level collection happens at all, so
//! it is resolved exactly once before the scrape endpoint is bound. Every
//! failure here is fatal to startup.

use crate::core::{Role, StatusError, StatusSource};
use tracing::{debug, info};

/// Queries the status utility in role-report mode and classifies the node.
pub async fn resolve_role(source: &dyn StatusSource) -> Result<Role, StatusError> {
    debug!("Querying status utility for node role");
    let output = source.report_role().await?;
    let text = String::from_utf8_lossy(&output);
    let role: Role = text.trim_end().parse()?;
    info!(%role, "Resolved node role");
    Ok(role)
}
