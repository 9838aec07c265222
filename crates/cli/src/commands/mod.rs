//! Subcommand implementations.

pub mod config_cmd;
pub mod context;
pub mod memory;

use std::path::Path;
use std::sync::Arc;
use threadwise_config::AppConfig;
use threadwise_core::memory::MemoryStore;
use threadwise_memory::{InMemoryStore, SqliteStore};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the store the configuration names.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn MemoryStore>, Box<dyn std::error::Error>> {
    match config.memory.backend.as_str() {
        "in_memory" => {
            tracing::warn!("in_memory backend selected; nothing will outlive this command");
            Ok(Arc::new(InMemoryStore::new()))
        }
        _ => {
            let path = config.memory.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = SqliteStore::new(&format!("sqlite://{}", path.display())).await?;
            Ok(Arc::new(store))
        }
    }
}
