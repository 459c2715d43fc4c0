//! Object metadata records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use treehub_types::{Namespace, Object, ObjectId, ObjectStatus};

use crate::document::{from_document, to_document, Document, DocumentStore, Filter};
use crate::error::{DbError, DbResult};

const OBJECTS: &str = "objects";

/// CRUD over object metadata records, keyed by `(namespace, id)`.
pub trait ObjectRepository: Send + Sync {
    /// Insert a new record. `AlreadyExists` if the key is taken.
    fn create(&self, object: &Object) -> DbResult<()>;

    /// `NotFound` if no record exists.
    fn find(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<Object>;

    /// Overwrite size and status of an existing record.
    fn update(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        byte_size: u64,
        status: ObjectStatus,
    ) -> DbResult<()>;

    /// Remove the record. Returns `false` if there was none.
    fn delete(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<bool>;

    fn exists(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<bool>;

    /// Move a `ServerUploading` record to `Uploaded`. `NotFound` when no
    /// record in `ServerUploading` matches.
    fn set_completed(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<()>;

    fn is_uploaded(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<bool>;

    /// All records with `status`, across namespaces.
    fn find_all_by_status(&self, status: ObjectStatus) -> DbResult<Vec<Object>>;

    /// Sum of `byte_size` over every record in `namespace`.
    fn usage(&self, namespace: &Namespace) -> DbResult<u64>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectRecord {
    id: ObjectId,
    namespace: Namespace,
    byte_size: u64,
    status: ObjectStatus,
}

impl From<&Object> for ObjectRecord {
    fn from(o: &Object) -> Self {
        Self {
            id: o.id.clone(),
            namespace: o.namespace.clone(),
            byte_size: o.byte_size,
            status: o.status,
        }
    }
}

impl From<ObjectRecord> for Object {
    fn from(r: ObjectRecord) -> Self {
        Self {
            namespace: r.namespace,
            id: r.id,
            byte_size: r.byte_size,
            status: r.status,
        }
    }
}

fn status_value(status: ObjectStatus) -> Value {
    Value::String(status.to_string())
}

fn key_filter(namespace: &Namespace, id: &ObjectId) -> Filter {
    Filter::new()
        .eq("id", id.as_str())
        .eq("namespace", namespace.as_str())
}

/// [`ObjectRepository`] over any [`DocumentStore`].
#[derive(Clone)]
pub struct DocumentObjectRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentObjectRepository {
    /// Wrap `store`, registering the unique `(namespace, id)` index.
    pub fn new(store: Arc<dyn DocumentStore>) -> DbResult<Self> {
        store.create_unique_index(OBJECTS, &["namespace", "id"])?;
        Ok(Self { store })
    }
}

impl ObjectRepository for DocumentObjectRepository {
    #[instrument(skip_all, fields(namespace = %object.namespace, object_id = %object.id))]
    fn create(&self, object: &Object) -> DbResult<()> {
        debug!("creating object record");
        let doc = to_document(&ObjectRecord::from(object))?;
        match self.store.insert_one(OBJECTS, doc) {
            Ok(()) => {
                debug!("object record created");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "object record creation failed");
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(namespace = %namespace, object_id = %id))]
    fn find(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<Object> {
        match self.store.find_one(OBJECTS, &key_filter(namespace, id))? {
            Some(doc) => Ok(from_document::<ObjectRecord>(doc)?.into()),
            None => {
                warn!("object record not found");
                Err(DbError::NotFound(format!("object {id} in {namespace}")))
            }
        }
    }

    #[instrument(skip_all, fields(namespace = %namespace, object_id = %id, size = byte_size, status = %status))]
    fn update(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        byte_size: u64,
        status: ObjectStatus,
    ) -> DbResult<()> {
        let mut set = Document::new();
        set.insert("byteSize".into(), Value::from(byte_size));
        set.insert("status".into(), status_value(status));
        match self
            .store
            .update_one(OBJECTS, &key_filter(namespace, id), set)
        {
            Ok(()) => {
                debug!("object record updated");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "object record update failed");
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(namespace = %namespace, object_id = %id))]
    fn delete(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<bool> {
        let removed = self
            .store
            .delete_many(OBJECTS, &key_filter(namespace, id))
            .inspect_err(|e| warn!(error = %e, "object record delete failed"))?;
        debug!(removed, "object record deleted");
        Ok(removed > 0)
    }

    fn exists(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<bool> {
        Ok(self.store.count(OBJECTS, &key_filter(namespace, id))? > 0)
    }

    #[instrument(skip_all, fields(namespace = %namespace, object_id = %id))]
    fn set_completed(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<()> {
        let filter =
            key_filter(namespace, id).eq("status", status_value(ObjectStatus::ServerUploading));
        let mut set = Document::new();
        set.insert("status".into(), status_value(ObjectStatus::Uploaded));
        match self.store.update_one(OBJECTS, &filter, set) {
            Ok(()) => {
                debug!("object marked uploaded");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "updating object status failed");
                Err(e)
            }
        }
    }

    fn is_uploaded(&self, namespace: &Namespace, id: &ObjectId) -> DbResult<bool> {
        let filter = key_filter(namespace, id).eq("status", status_value(ObjectStatus::Uploaded));
        Ok(self.store.count(OBJECTS, &filter)? > 0)
    }

    #[instrument(skip_all, fields(status = %status))]
    fn find_all_by_status(&self, status: ObjectStatus) -> DbResult<Vec<Object>> {
        let docs = self
            .store
            .find(OBJECTS, &Filter::new().eq("status", status_value(status)))?;
        let objects = docs
            .into_iter()
            .map(|d| from_document::<ObjectRecord>(d).map(Object::from))
            .collect::<DbResult<Vec<_>>>()?;
        debug!(count = objects.len(), "object lookup by status completed");
        Ok(objects)
    }

    fn usage(&self, namespace: &Namespace) -> DbResult<u64> {
        self.store.sum(
            OBJECTS,
            &Filter::new().eq("namespace", namespace.as_str()),
            "byteSize",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentStore;
    use treehub_types::ErrorKind;

    fn repo() -> DocumentObjectRepository {
        DocumentObjectRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap()
    }

    fn id(c: char) -> ObjectId {
        ObjectId::new(format!("{}.commit", c.to_string().repeat(64))).unwrap()
    }

    fn ns(s: &str) -> Namespace {
        Namespace::new(s)
    }

    // -----------------------------------------------------------------------
    // Create / find
    // -----------------------------------------------------------------------

    #[test]
    fn create_then_find() {
        let repo = repo();
        let obj = Object::uploading(ns("t1"), id('a'), 42);
        repo.create(&obj).unwrap();
        assert_eq!(repo.find(&ns("t1"), &id('a')).unwrap(), obj);
        assert!(repo.exists(&ns("t1"), &id('a')).unwrap());
        assert!(!repo.exists(&ns("t2"), &id('a')).unwrap());
    }

    #[test]
    fn duplicate_create_is_already_exists() {
        let repo = repo();
        let obj = Object::uploading(ns("t1"), id('a'), 1);
        repo.create(&obj).unwrap();
        let err = repo.create(&obj).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn find_missing_is_not_found() {
        let err = repo().find(&ns("t1"), &id('z')).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn stored_shape_is_camel_case() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let repo = DocumentObjectRepository::new(store.clone()).unwrap();
        repo.create(&Object::uploading(ns("t1"), id('a'), 7)).unwrap();
        let doc = store
            .find_one(OBJECTS, &Filter::new().eq("byteSize", 7))
            .unwrap()
            .unwrap();
        assert_eq!(doc.get("status"), Some(&Value::from("SERVER_UPLOADING")));
        assert_eq!(doc.get("namespace"), Some(&Value::from("t1")));
    }

    // -----------------------------------------------------------------------
    // Status transitions
    // -----------------------------------------------------------------------

    #[test]
    fn update_sets_size_and_status() {
        let repo = repo();
        repo.create(&Object::uploading(ns("t1"), id('a'), 10)).unwrap();
        repo.update(&ns("t1"), &id('a'), 12, ObjectStatus::Uploaded)
            .unwrap();
        let found = repo.find(&ns("t1"), &id('a')).unwrap();
        assert_eq!(found.byte_size, 12);
        assert!(found.is_uploaded());
        assert!(repo.is_uploaded(&ns("t1"), &id('a')).unwrap());
    }

    #[test]
    fn update_missing_is_not_found() {
        let err = repo()
            .update(&ns("t1"), &id('a'), 1, ObjectStatus::Uploaded)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn set_completed_only_from_uploading() {
        let repo = repo();
        repo.create(&Object::uploading(ns("t1"), id('a'), 3)).unwrap();
        assert!(!repo.is_uploaded(&ns("t1"), &id('a')).unwrap());
        repo.set_completed(&ns("t1"), &id('a')).unwrap();
        assert!(repo.is_uploaded(&ns("t1"), &id('a')).unwrap());

        let err = repo.set_completed(&ns("t1"), &id('a')).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = repo.set_completed(&ns("t1"), &id('b')).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // -----------------------------------------------------------------------
    // Delete / queries
    // -----------------------------------------------------------------------

    #[test]
    fn delete_reports_presence() {
        let repo = repo();
        repo.create(&Object::uploading(ns("t1"), id('a'), 3)).unwrap();
        assert!(repo.delete(&ns("t1"), &id('a')).unwrap());
        assert!(!repo.delete(&ns("t1"), &id('a')).unwrap());
        assert!(!repo.exists(&ns("t1"), &id('a')).unwrap());
    }

    #[test]
    fn find_all_by_status_spans_namespaces() {
        let repo = repo();
        repo.create(&Object::uploading(ns("t1"), id('a'), 1)).unwrap();
        repo.create(&Object::uploading(ns("t2"), id('a'), 1)).unwrap();
        repo.create(&Object::uploading(ns("t2"), id('b'), 1)).unwrap();
        repo.set_completed(&ns("t2"), &id('b')).unwrap();

        let pending = repo
            .find_all_by_status(ObjectStatus::ServerUploading)
            .unwrap();
        assert_eq!(pending.len(), 2);
        let done = repo.find_all_by_status(ObjectStatus::Uploaded).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, id('b'));
    }

    #[test]
    fn usage_sums_namespace() {
        let repo = repo();
        repo.create(&Object::uploading(ns("t1"), id('a'), 100)).unwrap();
        repo.create(&Object::uploading(ns("t1"), id('b'), 23)).unwrap();
        repo.create(&Object::uploading(ns("t2"), id('a'), 1000)).unwrap();
        assert_eq!(repo.usage(&ns("t1")).unwrap(), 123);
        assert_eq!(repo.usage(&ns("empty")).unwrap(), 0);
    }
}
