use tracing::info;

use crate::Result;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::server;
use crate::storage::StorageManager;
use crate::store::VectorStore;

/// Start the HTTP server, with optional host/port overrides on top of the
/// configuration file.
#[inline]
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load_default()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!("Starting server with model {}", config.ollama.model);
    server::serve(&config).await
}

/// Print where configuration is read from and whether a file exists there.
#[inline]
pub fn show_config_location() -> Result<()> {
    let config_dir = Config::config_dir()
        .map_err(|e| crate::DocbaseError::Config(e.to_string()))?;
    let config_path = config_dir.join("config.toml");

    println!("Configuration file: {}", config_path.display());
    if config_path.exists() {
        println!("Status: present");
    } else {
        println!("Status: not found (defaults in effect)");
    }
    println!("Use `config --show` to print the active settings.");

    Ok(())
}

/// Print the active configuration with the API key masked.
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default()?;

    println!("Server: http://{}", config.server.addr());
    println!("Base directory: {}", config.base_dir.display());
    println!("Upload directory: {}", config.upload_path().display());
    println!(
        "Vector store directory: {}",
        config.vector_store_path().display()
    );
    println!(
        "Chunking: {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!(
        "Embeddings: {} ({} dims, batch {}) via {}://{}:{}",
        config.ollama.model,
        config.ollama.embedding_dimension,
        config.ollama.batch_size,
        config.ollama.protocol,
        config.ollama.host,
        config.ollama.port
    );
    println!("LLM: {} at {}", config.llm.model, config.llm.api_base);
    println!(
        "LLM API key: {}",
        if config.llm.api_key.is_empty() {
            "not set"
        } else {
            "set"
        }
    );

    Ok(())
}

/// Show index and storage health: vector counts, raw-file accounting, and
/// embedding-service reachability.
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default()?;

    let store = VectorStore::open(
        &config.vector_store_path(),
        &config.ollama.model,
        config.ollama.embedding_dimension as usize,
    )?;
    let stats = store.stats()?;

    println!("Vector store: {}", stats.store_path);
    println!("  Vectors: {}", stats.total_vectors);
    println!("  Documents: {}", stats.total_documents);
    println!("  Size: {:.2} MB", stats.storage_size_mb);
    for document in &stats.documents {
        println!("    {document}");
    }

    let storage = StorageManager::new(&config.upload_path());
    let storage_stats = storage.stats()?;
    println!(
        "Uploads: {} files, {:.2} MB",
        storage_stats.total_files, storage_stats.total_size_mb
    );

    let client = OllamaClient::new(&config.ollama)?;
    let reachable = tokio::task::spawn_blocking(move || client.ping())
        .await
        .map_err(|e| crate::DocbaseError::Other(anyhow::anyhow!("status task failed: {e}")))?
        .is_ok();
    println!(
        "Ollama: {}",
        if reachable { "reachable" } else { "unreachable" }
    );

    Ok(())
}

/// Run the age-based eviction pass once and report what it freed.
#[inline]
pub async fn run_cleanup() -> Result<()> {
    let config = Config::load_default()?;
    let storage = StorageManager::new(&config.upload_path());

    let report = tokio::task::spawn_blocking(move || storage.cleanup())
        .await
        .map_err(|e| crate::DocbaseError::Other(anyhow::anyhow!("cleanup task failed: {e}")))??;

    println!(
        "Deleted {} files, freed {:.2} MB",
        report.deleted_files,
        report.freed_space_bytes as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}
