//! Telemetry persistence
//!
//! - [`backend::TelemetryStore`]: the trait the pipeline depends on
//! - [`memory::MemoryStore`]: bounded in-memory ring buffer
//! - [`sqlite::SqliteStore`]: SQLite with migrations (feature `storage-sqlite`)

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use tracing::info;

pub use backend::TelemetryStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

use crate::config::StorageConfig;

/// Build the store described by the configuration
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn TelemetryStore>> {
    match config {
        StorageConfig::None => {
            info!("using in-memory telemetry store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path, .. } => Ok(Arc::new(sqlite::SqliteStore::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::ConnectionFailed(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
