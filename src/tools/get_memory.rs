use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetMemoryParams {
    #[schemars(description = "ID of the memory to fetch, as returned by store_memory or search_memories")]
    pub id: String,
}
