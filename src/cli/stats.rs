use std::fmt::Write as _;

use anyhow::Result;
use memorylink::config::MemoryLinkConfig;
use memorylink::memory::{MemoryOrchestrator, ServiceStats};

/// Display memory statistics in the terminal.
pub async fn stats(config: &MemoryLinkConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let orchestrator = MemoryOrchestrator::open(config)?;
    let stats = orchestrator.stats().await?;

    let db_size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    print!("{}", render(&stats, db_size_bytes));

    Ok(())
}

/// Store-level figures only. Cache counters belong to a running server and
/// are always empty in a one-shot CLI process; `memory_stats` reports them.
fn render(stats: &ServiceStats, db_size_bytes: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Memory Statistics");
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out, "  Total memories:      {}", stats.total_memories);
    let _ = writeln!(out, "  Embedding model:     {}", stats.embedding_model);
    let _ = writeln!(out, "  Dimensions:          {}", stats.embedding_dimensions);
    let _ = writeln!(
        out,
        "  Encryption:          {}",
        if stats.encryption_enabled { "on" } else { "off" }
    );
    let _ = writeln!(out, "  Database size:       {db_size_bytes} bytes");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use memorylink::cache::CacheStats;

    #[test]
    fn report_leaves_out_per_process_cache_counters() {
        let stats = ServiceStats {
            total_memories: 12,
            embedding_model: "hash-trigram".into(),
            embedding_dimensions: 64,
            encryption_enabled: true,
            embedding_cache: CacheStats::default(),
            result_cache: CacheStats::default(),
        };
        let text = render(&stats, 4096);
        assert!(text.contains("Total memories:      12"));
        assert!(text.contains("Database size:       4096 bytes"));
        assert!(!text.to_lowercase().contains("cache"));
    }
}
