use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, instrument};
use treehub_types::{Namespace, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

type Key = (Namespace, ObjectId);

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. The stream is buffered completely
/// before the map is touched, so a failed read never replaces a blob.
pub struct InMemoryObjectStore {
    blobs: RwLock<HashMap<Key, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.read_map().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_map(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Key, Vec<u8>>>> {
        self.blobs
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write_map(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Key, Vec<u8>>>> {
        self.blobs
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    #[instrument(skip_all, fields(backend = "memory", namespace = %namespace, object_id = %id))]
    fn store_stream(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        reader: &mut dyn Read,
    ) -> StoreResult<u64> {
        debug!("buffering stream into blob");
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let written = data.len() as u64;
        self.write_map()?
            .insert((namespace.clone(), id.clone()), data);
        debug!(size = written, "blob stored");
        Ok(written)
    }

    #[instrument(skip_all, fields(backend = "memory", namespace = %namespace, object_id = %id))]
    fn read_full(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        writer: &mut dyn Write,
    ) -> StoreResult<u64> {
        let map = self.read_map()?;
        let data = map
            .get(&(namespace.clone(), id.clone()))
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.clone(),
                id: id.clone(),
            })?;
        writer.write_all(data)?;
        debug!(size = data.len(), "blob read completed");
        Ok(data.len() as u64)
    }

    fn exists(&self, namespace: &Namespace, id: &ObjectId) -> StoreResult<bool> {
        Ok(self
            .read_map()?
            .contains_key(&(namespace.clone(), id.clone())))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("blob_count", &self.len())
            .finish()
    }
}
