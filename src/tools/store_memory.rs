use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "The text to remember (1-50000 characters). Stored encrypted.")]
    pub content: String,

    #[schemars(
        description = "Optional flat JSON object of tags/attributes. Values may be strings, numbers, booleans or arrays of those; at most 10KB serialized."
    )]
    pub metadata: Option<serde_json::Value>,
}
