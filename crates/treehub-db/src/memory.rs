use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::collection::Collections;
use crate::document::{Document, DocumentStore, Filter};
use crate::error::{DbError, DbResult};

/// In-memory document store.
///
/// Each call holds the lock for its full duration, which makes unique index
/// checks and the write they guard a single atomic step.
pub struct InMemoryDocumentStore {
    state: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Collections::default()),
        }
    }

    fn read_state(&self) -> DbResult<RwLockReadGuard<'_, Collections>> {
        self.state
            .read()
            .map_err(|e| DbError::Backend(format!("lock poisoned: {e}")))
    }

    fn write_state(&self) -> DbResult<RwLockWriteGuard<'_, Collections>> {
        self.state
            .write()
            .map_err(|e| DbError::Backend(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn create_unique_index(&self, collection: &str, fields: &[&str]) -> DbResult<()> {
        self.write_state()?.create_unique_index(collection, fields)
    }

    fn insert_one(&self, collection: &str, doc: Document) -> DbResult<()> {
        self.write_state()?.insert_one(collection, doc)
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> DbResult<Option<Document>> {
        Ok(self.read_state()?.find_one(collection, filter))
    }

    fn find(&self, collection: &str, filter: &Filter) -> DbResult<Vec<Document>> {
        Ok(self.read_state()?.find(collection, filter))
    }

    fn update_one(&self, collection: &str, filter: &Filter, set: Document) -> DbResult<()> {
        self.write_state()?.update_one(collection, filter, set)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> DbResult<u64> {
        Ok(self.write_state()?.delete_many(collection, filter))
    }

    fn count(&self, collection: &str, filter: &Filter) -> DbResult<u64> {
        Ok(self.read_state()?.count(collection, filter))
    }

    fn sum(&self, collection: &str, filter: &Filter, field: &str) -> DbResult<u64> {
        self.read_state()?.sum(collection, filter, field)
    }

    fn ping(&self) -> DbResult<()> {
        self.read_state().map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn doc(ns: &str, id: &str) -> Document {
        match json!({"namespace": ns, "id": id}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn basic_operations() {
        let store = InMemoryDocumentStore::new();
        store.ping().unwrap();
        store
            .create_unique_index("objects", &["namespace", "id"])
            .unwrap();
        store.insert_one("objects", doc("t1", "a")).unwrap();
        assert!(store
            .find_one("objects", &Filter::new().eq("id", "a"))
            .unwrap()
            .is_some());
        assert_eq!(store.count("objects", &Filter::new()).unwrap(), 1);
        assert_eq!(
            store
                .delete_many("objects", &Filter::new().eq("id", "a"))
                .unwrap(),
            1
        );
        assert!(store
            .find_one("objects", &Filter::new().eq("id", "a"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn concurrent_inserts_have_one_winner() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .create_unique_index("objects", &["namespace", "id"])
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert_one("objects", doc("t1", "race")).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(store.count("objects", &Filter::new()).unwrap(), 1);
    }
}
