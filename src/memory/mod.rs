//! Memory Orchestrator and its domain types.

pub mod orchestrator;
pub mod result_cache;
pub mod types;
pub mod validate;

pub use orchestrator::{MemoryOrchestrator, OrchestratorOptions};
pub use result_cache::ResultCache;
pub use types::{
    MemoryRecord, Metadata, MetadataValue, SearchRequest, SearchResponse, SearchResult,
    ServiceStats, WriteReceipt, WriteRequest,
};
