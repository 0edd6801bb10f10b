//! ==============================================================================
//! main.rs - readings hub entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load configuration (readings.toml or defaults)
//!     - install tracing
//!     - open the configured readings store
//!     - serve the json api until ctrl-c
//!
//! ==============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;

use readings_hub::config::{HubConfig, StorageBackend};
use readings_hub::{api, telemetry, MemoryStore, ReadingService, ReadingStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (config, skipped) = HubConfig::load_or_default()?;

    // step 2: logging
    telemetry::init_tracing(&config.logging)?;
    for reason in &skipped {
        tracing::warn!(%reason, "skipped config file");
    }
    config.log_summary();

    // step 3: open the store
    let store: Arc<dyn ReadingStore> = match config.storage.backend {
        StorageBackend::Sqlite => {
            let path = config.storage.path.clone();
            let pool_size = config.storage.pool_size;
            let store = tokio::task::spawn_blocking(move || SqliteStore::open(path, pool_size))
                .await?
                .with_context(|| {
                    format!("failed to open sqlite store at {}", config.storage.path.display())
                })?;
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory store, readings are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    // step 4: serve
    api::serve(&config.server.bind, ReadingService::new(store)).await
}
