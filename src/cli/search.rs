use anyhow::Result;
use memorylink::config::MemoryLinkConfig;
use memorylink::memory::{MemoryOrchestrator, SearchRequest};

/// Run a one-off search from the terminal.
pub async fn search(
    config: &MemoryLinkConfig,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f64>,
) -> Result<()> {
    let orchestrator = MemoryOrchestrator::open(config)?;
    let request = SearchRequest::new(
        query,
        limit.unwrap_or(config.retrieval.default_limit),
        threshold.unwrap_or(config.retrieval.default_threshold),
    );
    let response = orchestrator.search(request).await?;

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!(
        "Found {} result(s) in {:.1}ms\n",
        response.total_found, response.execution_time_ms
    );

    for (i, result) in response.results.iter().enumerate() {
        println!(
            "  {}. {} (similarity: {:.4})",
            i + 1,
            result.memory_id,
            result.similarity
        );
        println!("     {}", preview(&result.content, 120));
        if !result.metadata.is_empty() {
            println!("     {}", result.metadata.to_json());
        }
        println!();
    }

    Ok(())
}

/// First `max` characters, with an ellipsis if anything was cut.
fn preview(content: &str, max: usize) -> String {
    match content.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
