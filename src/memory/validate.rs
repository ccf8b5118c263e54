//! Input checks run before any side effect.

use crate::error::{MemoryError, MemoryResult};
use crate::memory::types::{MetadataValue, SearchRequest, WriteRequest};

pub const MAX_CONTENT_CHARS: usize = 50_000;
pub const MAX_METADATA_BYTES: usize = 10 * 1024;
pub const MAX_QUERY_CHARS: usize = 1_000;
pub const MAX_LIMIT: usize = 100;

pub fn write(request: &WriteRequest) -> MemoryResult<()> {
    let chars = request.content.chars().count();
    if chars == 0 || request.content.trim().is_empty() {
        return Err(MemoryError::validation("content must not be empty"));
    }
    if chars > MAX_CONTENT_CHARS {
        return Err(MemoryError::validation(format!(
            "content is {chars} characters, maximum is {MAX_CONTENT_CHARS}"
        )));
    }

    let size = request.metadata.serialized_len();
    if size > MAX_METADATA_BYTES {
        return Err(MemoryError::validation(format!(
            "metadata is {size} bytes serialized, maximum is {MAX_METADATA_BYTES}"
        )));
    }
    for (key, value) in request.metadata.iter() {
        if key.is_empty() {
            return Err(MemoryError::validation("metadata keys must not be empty"));
        }
        if !is_finite(value) {
            return Err(MemoryError::validation(format!(
                "metadata '{key}' holds a non-finite number"
            )));
        }
    }
    Ok(())
}

fn is_finite(value: &MetadataValue) -> bool {
    match value {
        MetadataValue::Float(f) => f.is_finite(),
        MetadataValue::Array(items) => items.iter().all(is_finite),
        _ => true,
    }
}

pub fn search(request: &SearchRequest) -> MemoryResult<()> {
    let chars = request.query.chars().count();
    if request.query.trim().is_empty() {
        return Err(MemoryError::validation("query must not be empty"));
    }
    if chars > MAX_QUERY_CHARS {
        return Err(MemoryError::validation(format!(
            "query is {chars} characters, maximum is {MAX_QUERY_CHARS}"
        )));
    }
    if !(1..=MAX_LIMIT).contains(&request.limit) {
        return Err(MemoryError::validation(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {}",
            request.limit
        )));
    }
    if !request.threshold.is_finite() || !(0.0..=1.0).contains(&request.threshold) {
        return Err(MemoryError::validation(format!(
            "threshold must be between 0.0 and 1.0, got {}",
            request.threshold
        )));
    }
    Ok(())
}

pub fn memory_id(id: &str) -> MemoryResult<()> {
    if id.trim().is_empty() {
        return Err(MemoryError::validation("memory id must not be empty"));
    }
    Ok(())
}
