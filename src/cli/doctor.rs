//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};
use memorylink::config::MemoryLinkConfig;
use memorylink::db;
use memorylink::embedding::local::model_paths;
use memorylink::embedding::NORMALIZATION;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &MemoryLinkConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("MemoryLink Health Report");
    println!("========================");
    println!();

    let key_status = match config.security.encryption_key.as_deref() {
        Some(key) if !key.trim().is_empty() => "configured",
        _ => "MISSING (run `memorylink keygen` and set MEMORYLINK_ENCRYPTION_KEY)",
    };
    println!("Encryption key:    {key_status}");

    println!("Embedding provider: {}", config.embedding.provider);
    if config.embedding.provider == "local" {
        let (model, tokenizer) = model_paths(&config.embedding);
        let present = model.exists() && tokenizer.exists();
        println!(
            "  Model files:     {}",
            if present { "present" } else { "missing (run `memorylink model download`)" }
        );
    }
    println!();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It is created on the first `memorylink serve`.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path, config.embedding.dimensions)
        .context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();

    let configured_dims = config.embedding.dimensions.to_string();
    println!("Embedding identity:");
    compare("Model", report.embedding_model.as_deref(), config.embedding.index_model());
    compare("Dimensions", report.embedding_dimensions.as_deref(), &configured_dims);
    compare("Normalization", report.embedding_normalization.as_deref(), NORMALIZATION);
    println!();

    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  Vectors:         {}", report.vector_count);
    if report.memory_count != report.vector_count {
        println!("  WARNING: memory and vector counts differ");
    }
    println!();

    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: restore ~/.memorylink/memory.db from a backup.");
    }

    Ok(())
}

fn compare(label: &str, stored: Option<&str>, configured: &str) {
    match stored {
        None => println!("  {label:<15}  (not recorded yet), configured {configured}"),
        Some(stored) if stored == configured => println!("  {label:<15}  {stored} (OK)"),
        Some(stored) => println!("  {label:<15}  stored {stored}, configured {configured}: MISMATCH"),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
