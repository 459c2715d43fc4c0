//! Ref records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use treehub_types::{Commit, Namespace, ObjectId, Ref, RefName};

use crate::document::{from_document, to_document, Document, DocumentStore, Filter};
use crate::error::{DbError, DbResult};

const REFS: &str = "refs";

/// CRUD over refs, keyed by `(namespace, name)`.
pub trait RefRepository: Send + Sync {
    /// Insert a new ref. `AlreadyExists` if the name is taken.
    fn create(&self, reference: &Ref) -> DbResult<()>;

    /// `NotFound` if missing. Records whose object id no longer matches
    /// their commit are rejected.
    fn find(&self, namespace: &Namespace, name: &RefName) -> DbResult<Ref>;

    /// Overwrite value and object id of an existing ref.
    fn update(&self, reference: &Ref) -> DbResult<()>;

    /// Returns `false` if there was nothing to delete.
    fn delete(&self, namespace: &Namespace, name: &RefName) -> DbResult<bool>;

    fn exists(&self, namespace: &Namespace, name: &RefName) -> DbResult<bool>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefRecord {
    name: RefName,
    namespace: Namespace,
    value: Commit,
    object_id: ObjectId,
}

impl From<&Ref> for RefRecord {
    fn from(r: &Ref) -> Self {
        Self {
            name: r.name.clone(),
            namespace: r.namespace.clone(),
            value: r.value.clone(),
            object_id: r.object_id.clone(),
        }
    }
}

fn key_filter(namespace: &Namespace, name: &RefName) -> Filter {
    Filter::new()
        .eq("name", name.as_str())
        .eq("namespace", namespace.as_str())
}

/// [`RefRepository`] over any [`DocumentStore`].
#[derive(Clone)]
pub struct DocumentRefRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocumentRefRepository {
    /// Wrap `store`, registering the unique `(namespace, name)` index.
    pub fn new(store: Arc<dyn DocumentStore>) -> DbResult<Self> {
        store.create_unique_index(REFS, &["namespace", "name"])?;
        Ok(Self { store })
    }
}

impl RefRepository for DocumentRefRepository {
    #[instrument(skip_all, fields(namespace = %reference.namespace, ref_name = %reference.name))]
    fn create(&self, reference: &Ref) -> DbResult<()> {
        debug!("creating ref");
        let doc = to_document(&RefRecord::from(reference))?;
        self.store
            .insert_one(REFS, doc)
            .inspect_err(|e| warn!(error = %e, "ref creation failed"))?;
        debug!(value = %reference.value, "ref created");
        Ok(())
    }

    #[instrument(skip_all, fields(namespace = %namespace, ref_name = %name))]
    fn find(&self, namespace: &Namespace, name: &RefName) -> DbResult<Ref> {
        let Some(doc) = self.store.find_one(REFS, &key_filter(namespace, name))? else {
            warn!("ref not found");
            return Err(DbError::NotFound(format!("ref {name} in {namespace}")));
        };
        let record: RefRecord = from_document(doc)?;
        let reference = Ref {
            namespace: record.namespace,
            name: record.name,
            value: record.value,
            object_id: record.object_id,
        };
        reference.validate()?;
        Ok(reference)
    }

    #[instrument(skip_all, fields(namespace = %reference.namespace, ref_name = %reference.name))]
    fn update(&self, reference: &Ref) -> DbResult<()> {
        let mut set = Document::new();
        set.insert("value".into(), Value::from(reference.value.as_str()));
        set.insert("objectId".into(), Value::from(reference.object_id.as_str()));
        self.store
            .update_one(REFS, &key_filter(&reference.namespace, &reference.name), set)
            .inspect_err(|e| warn!(error = %e, "ref update failed"))?;
        debug!(value = %reference.value, "ref updated");
        Ok(())
    }

    #[instrument(skip_all, fields(namespace = %namespace, ref_name = %name))]
    fn delete(&self, namespace: &Namespace, name: &RefName) -> DbResult<bool> {
        let removed = self
            .store
            .delete_many(REFS, &key_filter(namespace, name))
            .inspect_err(|e| warn!(error = %e, "ref delete failed"))?;
        debug!(removed, "ref deleted");
        Ok(removed > 0)
    }

    fn exists(&self, namespace: &Namespace, name: &RefName) -> DbResult<bool> {
        Ok(self.store.count(REFS, &key_filter(namespace, name))? > 0)
    }
}
