//! Backend construction from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use treehub_db::{DbError, DocumentStore, FjallDocumentStore, InMemoryDocumentStore};
use treehub_store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};

use crate::config::{DbConfig, StorageConfig};
use crate::error::ServerResult;

/// Root used when a local filesystem store is configured without one.
pub fn default_storage_root() -> PathBuf {
    std::env::temp_dir().join("treehub")
}

pub fn build_object_store(config: &StorageConfig) -> ServerResult<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config {
        StorageConfig::LocalFs { root } => {
            let root = if root.as_os_str().is_empty() {
                let fallback = default_storage_root();
                warn!(root = %fallback.display(), "storage root not configured, using temp dir");
                fallback
            } else {
                root.clone()
            };
            Arc::new(LocalFsObjectStore::new(root)?)
        }
        StorageConfig::Memory => Arc::new(InMemoryObjectStore::new()),
    };
    info!(backend = store.backend_name(), "blob store ready");
    Ok(store)
}

/// Open the document store and check that it answers.
pub fn build_document_store(config: &DbConfig) -> ServerResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config {
        DbConfig::Fjall { path } => Arc::new(FjallDocumentStore::open(path)?),
        DbConfig::Memory => Arc::new(InMemoryDocumentStore::new()),
    };
    store
        .ping()
        .map_err(|e| DbError::Connection(format!("{} did not answer: {e}", store.backend_name())))?;
    info!(backend = store.backend_name(), "document store ready");
    Ok(store)
}
