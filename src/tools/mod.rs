pub mod get_memory;
pub mod memory_stats;
pub mod search_memories;
pub mod store_memory;

use get_memory::GetMemoryParams;
use memory_stats::MemoryStatsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_memories::SearchMemoriesParams;
use serde::Serialize;
use std::sync::Arc;
use store_memory::StoreMemoryParams;

use memorylink::config::RetrievalConfig;
use memorylink::error::MemoryError;
use memorylink::memory::{MemoryOrchestrator, Metadata, SearchRequest, WriteRequest};

/// The MCP tool handler. A thin adapter: parameters in, orchestrator call,
/// JSON out. Errors are reported as `"<error_kind>: <message>"`.
#[derive(Clone)]
pub struct MemoryLinkTools {
    tool_router: ToolRouter<Self>,
    orchestrator: Arc<MemoryOrchestrator>,
    retrieval: Arc<RetrievalConfig>,
}

fn tool_error(err: MemoryError) -> String {
    format!("{}: {err}", err.kind())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl MemoryLinkTools {
    pub fn new(orchestrator: Arc<MemoryOrchestrator>, retrieval: RetrievalConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            orchestrator,
            retrieval: Arc::new(retrieval),
        }
    }

    /// Store a new encrypted memory.
    #[tool(description = "Store a memory. The content is encrypted at rest and indexed for semantic search. Returns the new memory id and creation time.")]
    async fn store_memory(
        &self,
        Parameters(params): Parameters<StoreMemoryParams>,
    ) -> Result<String, String> {
        let metadata = match &params.metadata {
            Some(value) => Metadata::from_json(value).map_err(tool_error)?,
            None => Metadata::new(),
        };
        let request = WriteRequest::new(params.content).with_metadata(metadata);
        let receipt = self.orchestrator.write(request).await.map_err(tool_error)?;
        to_json(&receipt)
    }

    /// Semantic search over stored memories.
    #[tool(description = "Search memories by meaning. Returns decrypted matches ordered by similarity, each with its id, similarity score, content and metadata.")]
    async fn search_memories(
        &self,
        Parameters(params): Parameters<SearchMemoriesParams>,
    ) -> Result<String, String> {
        let request = SearchRequest::new(
            params.query,
            params.limit.unwrap_or(self.retrieval.default_limit),
            params.threshold.unwrap_or(self.retrieval.default_threshold),
        );
        let response = self.orchestrator.search(request).await.map_err(tool_error)?;
        to_json(&response)
    }

    /// Fetch one memory by id.
    #[tool(description = "Fetch a single memory by id, with its decrypted content, metadata and timestamps.")]
    async fn get_memory(
        &self,
        Parameters(params): Parameters<GetMemoryParams>,
    ) -> Result<String, String> {
        match self.orchestrator.get(&params.id).await.map_err(tool_error)? {
            Some(record) => to_json(&record),
            None => Err(format!("not_found: no memory with id {}", params.id)),
        }
    }

    /// Store statistics.
    #[tool(description = "Get memory store statistics: total memories, embedding model and dimensions, cache hit rates.")]
    async fn memory_stats(
        &self,
        Parameters(_params): Parameters<MemoryStatsParams>,
    ) -> Result<String, String> {
        let stats = self.orchestrator.stats().await.map_err(tool_error)?;
        to_json(&stats)
    }
}

#[tool_handler]
impl ServerHandler for MemoryLinkTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "MemoryLink is an encrypted personal memory store. Use store_memory to save \
                 something, search_memories to find memories by meaning, and get_memory to \
                 fetch one by id."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
