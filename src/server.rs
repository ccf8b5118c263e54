//! MCP server initialization for the stdio transport.

use anyhow::{bail, Result};
use memorylink::config::MemoryLinkConfig;
use memorylink::memory::MemoryOrchestrator;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::tools::MemoryLinkTools;

/// Start the MCP server over stdio transport.
///
/// The orchestrator is built before the transport opens, so a missing
/// encryption key or a mismatched index stops the process before any client
/// request is accepted.
pub async fn serve_stdio(config: MemoryLinkConfig) -> Result<()> {
    if config.server.transport != "stdio" {
        bail!(
            "unsupported transport '{}'; only stdio is available",
            config.server.transport
        );
    }
    tracing::info!("starting MemoryLink MCP server on stdio");

    let orchestrator = Arc::new(MemoryOrchestrator::open(&config)?);
    tracing::info!(db = %config.resolved_db_path().display(), "memory store ready");

    let tools = MemoryLinkTools::new(orchestrator, config.retrieval.clone());
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
