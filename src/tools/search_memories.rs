//! MCP `search_memories` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_memories` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchMemoriesParams {
    /// Natural language query.
    #[schemars(description = "Natural language query to search memories by meaning (1-1000 characters)")]
    pub query: String,

    /// Maximum number of results (1–100). Defaults to `retrieval.default_limit`.
    #[schemars(description = "Maximum number of results to return (1-100). Defaults to 10.")]
    pub limit: Option<usize>,

    /// Minimum cosine similarity (0.0–1.0). Defaults to `retrieval.default_threshold`.
    #[schemars(description = "Minimum similarity score (0.0-1.0). Defaults to 0.3.")]
    pub threshold: Option<f64>,
}
