//! Collection state behind the in-memory store.

use std::collections::BTreeMap;

use crate::document::{describe_key, sum_field, Document, Filter};
use crate::error::{DbError, DbResult};

#[derive(Clone, Debug, Default)]
pub(crate) struct Collections {
    collections: BTreeMap<String, Collection>,
}

#[derive(Clone, Debug, Default)]
struct Collection {
    unique_indexes: Vec<Vec<String>>,
    documents: Vec<Document>,
}

impl Collection {
    /// First unique index on which `doc` collides with a stored document,
    /// ignoring the document at position `skip`.
    fn collision(&self, doc: &Document, skip: Option<usize>) -> Option<&[String]> {
        self.unique_indexes
            .iter()
            .find(|index| {
                self.documents
                    .iter()
                    .enumerate()
                    .any(|(i, other)| Some(i) != skip && same_key(index, doc, other))
            })
            .map(Vec::as_slice)
    }
}

/// Two documents collide on `index` when every indexed field is present in
/// both and equal.
fn same_key(index: &[String], a: &Document, b: &Document) -> bool {
    index.iter().all(|field| match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    })
}

impl Collections {
    fn get(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    fn get_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }

    pub(crate) fn create_unique_index(&mut self, name: &str, fields: &[&str]) -> DbResult<()> {
        let index: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let coll = self.get_mut(name);
        if coll.unique_indexes.contains(&index) {
            return Ok(());
        }
        for (i, a) in coll.documents.iter().enumerate() {
            if coll.documents[i + 1..].iter().any(|b| same_key(&index, a, b)) {
                return Err(DbError::AlreadyExists(format!(
                    "{name}: existing documents collide on ({})",
                    describe_key(&index, a)
                )));
            }
        }
        coll.unique_indexes.push(index);
        Ok(())
    }

    pub(crate) fn insert_one(&mut self, name: &str, doc: Document) -> DbResult<()> {
        let coll = self.get_mut(name);
        if let Some(index) = coll.collision(&doc, None) {
            return Err(DbError::AlreadyExists(format!(
                "{name}: ({})",
                describe_key(index, &doc)
            )));
        }
        coll.documents.push(doc);
        Ok(())
    }

    pub(crate) fn find_one(&self, name: &str, filter: &Filter) -> Option<Document> {
        self.get(name)?
            .documents
            .iter()
            .find(|d| filter.matches(d))
            .cloned()
    }

    pub(crate) fn find(&self, name: &str, filter: &Filter) -> Vec<Document> {
        self.get(name)
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn update_one(&mut self, name: &str, filter: &Filter, set: Document) -> DbResult<()> {
        let coll = self.get_mut(name);
        let pos = coll
            .documents
            .iter()
            .position(|d| filter.matches(d))
            .ok_or_else(|| DbError::NotFound(format!("{name}: {filter}")))?;

        let mut updated = coll.documents[pos].clone();
        updated.extend(set);
        if let Some(index) = coll.collision(&updated, Some(pos)) {
            return Err(DbError::AlreadyExists(format!(
                "{name}: ({})",
                describe_key(index, &updated)
            )));
        }
        coll.documents[pos] = updated;
        Ok(())
    }

    pub(crate) fn delete_many(&mut self, name: &str, filter: &Filter) -> u64 {
        let Some(coll) = self.collections.get_mut(name) else {
            return 0;
        };
        let before = coll.documents.len();
        coll.documents.retain(|d| !filter.matches(d));
        (before - coll.documents.len()) as u64
    }

    pub(crate) fn count(&self, name: &str, filter: &Filter) -> u64 {
        self.get(name)
            .map(|c| c.documents.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0)
    }

    pub(crate) fn sum(&self, name: &str, filter: &Filter, field: &str) -> DbResult<u64> {
        let Some(coll) = self.get(name) else {
            return Ok(0);
        };
        sum_field(name, field, coll.documents.iter().filter(|d| filter.matches(d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn indexed() -> Collections {
        let mut c = Collections::default();
        c.create_unique_index("objects", &["namespace", "id"]).unwrap();
        c
    }

    // -----------------------------------------------------------------------
    // Unique indexes
    // -----------------------------------------------------------------------

    #[test]
    fn insert_rejects_duplicate_key() {
        let mut c = indexed();
        c.insert_one("objects", doc(json!({"namespace": "t1", "id": "a"})))
            .unwrap();
        let err = c
            .insert_one("objects", doc(json!({"namespace": "t1", "id": "a", "x": 1})))
            .unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
        assert_eq!(c.count("objects", &Filter::new()), 1);
    }

    #[test]
    fn same_id_in_other_namespace_is_allowed() {
        let mut c = indexed();
        c.insert_one("objects", doc(json!({"namespace": "t1", "id": "a"})))
            .unwrap();
        c.insert_one("objects", doc(json!({"namespace": "t2", "id": "a"})))
            .unwrap();
        assert_eq!(c.count("objects", &Filter::new().eq("id", "a")), 2);
    }

    #[test]
    fn index_creation_is_idempotent_and_checks_existing() {
        let mut c = Collections::default();
        c.insert_one("refs", doc(json!({"namespace": "t1", "name": "main"})))
            .unwrap();
        c.insert_one("refs", doc(json!({"namespace": "t1", "name": "main"})))
            .unwrap();
        assert!(matches!(
            c.create_unique_index("refs", &["namespace", "name"]),
            Err(DbError::AlreadyExists(_))
        ));

        let mut c = indexed();
        c.create_unique_index("objects", &["namespace", "id"]).unwrap();
    }

    #[test]
    fn update_cannot_create_collision() {
        let mut c = indexed();
        c.insert_one("objects", doc(json!({"namespace": "t1", "id": "a"})))
            .unwrap();
        c.insert_one("objects", doc(json!({"namespace": "t1", "id": "b"})))
            .unwrap();
        let err = c
            .update_one(
                "objects",
                &Filter::new().eq("id", "b"),
                doc(json!({"id": "a"})),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
    }

    // -----------------------------------------------------------------------
    // Update / delete / aggregate
    // -----------------------------------------------------------------------

    #[test]
    fn update_merges_fields() {
        let mut c = indexed();
        c.insert_one(
            "objects",
            doc(json!({"namespace": "t1", "id": "a", "byteSize": 1, "status": "SERVER_UPLOADING"})),
        )
        .unwrap();
        c.update_one(
            "objects",
            &Filter::new().eq("id", "a"),
            doc(json!({"status": "UPLOADED", "byteSize": 9})),
        )
        .unwrap();
        let found = c
            .find_one("objects", &Filter::new().eq("id", "a"))
            .unwrap();
        assert_eq!(found.get("status"), Some(&json!("UPLOADED")));
        assert_eq!(found.get("byteSize"), Some(&json!(9)));
        assert_eq!(found.get("namespace"), Some(&json!("t1")));
    }

    #[test]
    fn update_missing_is_not_found() {
        let mut c = indexed();
        let err = c
            .update_one("objects", &Filter::new().eq("id", "zz"), Document::new())
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn delete_many_counts_removed() {
        let mut c = indexed();
        for id in ["a", "b", "c"] {
            c.insert_one("objects", doc(json!({"namespace": "t1", "id": id})))
                .unwrap();
        }
        assert_eq!(c.delete_many("objects", &Filter::new().eq("id", "b")), 1);
        assert_eq!(c.delete_many("objects", &Filter::new().eq("id", "b")), 0);
        assert_eq!(c.delete_many("nothing", &Filter::new()), 0);
        assert_eq!(c.find("objects", &Filter::new()).len(), 2);
    }

    #[test]
    fn sum_over_filter() {
        let mut c = indexed();
        c.insert_one("objects", doc(json!({"namespace": "t1", "id": "a", "byteSize": 5})))
            .unwrap();
        c.insert_one("objects", doc(json!({"namespace": "t1", "id": "b", "byteSize": 7})))
            .unwrap();
        c.insert_one("objects", doc(json!({"namespace": "t2", "id": "a", "byteSize": 100})))
            .unwrap();
        assert_eq!(
            c.sum("objects", &Filter::new().eq("namespace", "t1"), "byteSize")
                .unwrap(),
            12
        );
        assert_eq!(c.sum("empty", &Filter::new(), "byteSize").unwrap(), 0);
    }

    #[test]
    fn sum_rejects_non_numeric() {
        let mut c = Collections::default();
        c.insert_one("objects", doc(json!({"byteSize": "lots"})))
            .unwrap();
        assert!(matches!(
            c.sum("objects", &Filter::new(), "byteSize"),
            Err(DbError::Serialization(_))
        ));
    }
}
