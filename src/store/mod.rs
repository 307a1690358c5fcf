//! Persistence layer: a string key-value store with libSQL and in-memory
//! backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

use std::sync::Arc;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::BlobStore;

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Open the store selected by configuration.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn BlobStore>, StoreError> {
    match &config.path {
        Some(path) => Ok(Arc::new(LibSqlStore::new_local(path).await?)),
        None => {
            tracing::info!("No store path configured, thread mappings are kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
