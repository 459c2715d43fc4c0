//! Two-plane object storage.
//!
//! Per `(namespace, id)` an object is in one of three logical states:
//!
//! - **Absent**: no metadata record (blob bytes, if any, do not count)
//! - **Registered**: record in `ServerUploading`, blob write pending or abandoned
//! - **Committed**: record in `Uploaded`, blob written
//!
//! The metadata record is authoritative. Nothing spans both planes
//! atomically; failures mid-upload are compensated by deleting the record,
//! on a best-effort basis.

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use treehub_db::ObjectRepository;
use treehub_store::ObjectStore;
use treehub_types::{Namespace, Object, ObjectId, ObjectStatus};

use crate::error::ServiceResult;

/// Orchestrates the metadata repository and the blob store.
#[derive(Clone)]
pub struct ObjectService {
    repo: Arc<dyn ObjectRepository>,
    store: Arc<dyn ObjectStore>,
}

impl ObjectService {
    /// Pair a record repository with the blob store holding the same objects.
    pub fn new(repo: Arc<dyn ObjectRepository>, store: Arc<dyn ObjectStore>) -> Self {
        Self { repo, store }
    }

    /// True only when both the record and the blob exist.
    #[instrument(skip_all, fields(namespace = %namespace, object_id = %id))]
    pub fn exists(&self, namespace: &Namespace, id: &ObjectId) -> ServiceResult<bool> {
        let blob = self.store.exists(namespace, id)?;
        let record = self.repo.exists(namespace, id)?;
        if blob != record {
            debug!(blob, record, "object present in one plane only");
        }
        Ok(blob && record)
    }

    /// Upload `reader` as the content of `(namespace, id)`.
    ///
    /// `declared_size` is advisory: it is recorded while the upload runs and
    /// replaced by the actual byte count on success. An existing record is
    /// reused, so an interrupted upload can simply be retried. Returns the
    /// number of bytes written.
    #[instrument(skip_all, fields(namespace = %namespace, object_id = %id, size = declared_size))]
    pub fn store_stream(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        declared_size: u64,
        reader: &mut dyn Read,
    ) -> ServiceResult<u64> {
        if !self.repo.exists(namespace, id)? {
            let record = Object::uploading(namespace.clone(), id.clone(), declared_size);
            self.repo.create(&record)?;
        }

        let written = match self.store.store_stream(namespace, id, reader) {
            Ok(written) => written,
            Err(e) => {
                self.compensate(namespace, id);
                return Err(e.into());
            }
        };

        if written != declared_size {
            warn!(
                declared = declared_size,
                actual = written,
                "uploaded size does not match declared size"
            );
        }

        if let Err(e) = self
            .repo
            .update(namespace, id, written, ObjectStatus::Uploaded)
        {
            self.compensate(namespace, id);
            return Err(e.into());
        }

        debug!(size = written, "object uploaded");
        Ok(written)
    }

    /// Copy the blob into `writer`. Status is not consulted.
    pub fn read_full(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        writer: &mut dyn Write,
    ) -> ServiceResult<u64> {
        Ok(self.store.read_full(namespace, id, writer)?)
    }

    /// Mark a registered object as uploaded without touching the blob plane.
    pub fn set_completed(&self, namespace: &Namespace, id: &ObjectId) -> ServiceResult<()> {
        Ok(self.repo.set_completed(namespace, id)?)
    }

    /// Bytes recorded for `namespace`.
    pub fn usage(&self, namespace: &Namespace) -> ServiceResult<u64> {
        Ok(self.repo.usage(namespace)?)
    }

    /// Records still in `ServerUploading`, across all namespaces. These are
    /// either in flight or orphans left by a failed compensation.
    pub fn pending_uploads(&self) -> ServiceResult<Vec<Object>> {
        Ok(self.repo.find_all_by_status(ObjectStatus::ServerUploading)?)
    }

    /// Best-effort removal of the record after a failed upload step. A
    /// failure here is logged and swallowed; the caller returns the error
    /// that triggered compensation.
    fn compensate(&self, namespace: &Namespace, id: &ObjectId) {
        match self.repo.delete(namespace, id) {
            Ok(_) => debug!("object record removed after failed upload"),
            Err(e) => warn!(error = %e, "failed to remove object record after failed upload"),
        }
    }
}

impl std::fmt::Debug for ObjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectService")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}
