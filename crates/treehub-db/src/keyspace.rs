//! Durable document store on an embedded LSM keyspace.
//!
//! Three partitions hold the data:
//!
//! - `documents`: `<collection>\0<id:u64 BE>` to the document as JSON.
//! - `indexes`: `<collection>\0<fields>\0<v1>\0<v2>...` to the owning id,
//!   one entry per unique index per document. Values are JSON-encoded, so
//!   they never contain a raw NUL.
//! - `meta`: the id counter and the index definitions.
//!
//! Every mutation is one atomic batch across the partitions, synced before
//! the call returns. Lookups whose filter pins every field of a unique index
//! are point reads; everything else scans the collection.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::document::{describe_key, sum_field, Document, DocumentStore, Filter};
use crate::error::{DbError, DbResult};

const NEXT_ID: &[u8] = b"next_id";
const INDEX_DEF_PREFIX: &[u8] = b"index\0";

/// Unique indexes and the id counter, mirrored from the `meta` partition.
#[derive(Debug, Default)]
struct Schema {
    next_id: u64,
    indexes: HashMap<String, Vec<Vec<String>>>,
}

impl Schema {
    fn indexes(&self, collection: &str) -> &[Vec<String>] {
        self.indexes
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Document store backed by a fjall keyspace directory.
pub struct FjallDocumentStore {
    path: PathBuf,
    keyspace: Keyspace,
    documents: PartitionHandle,
    indexes: PartitionHandle,
    meta: PartitionHandle,
    // Writers hold the write guard for the whole read-check-commit cycle,
    // which makes unique checks and the batch they guard one atomic step.
    schema: RwLock<Schema>,
}

impl FjallDocumentStore {
    /// Open the keyspace at `path`, creating it when missing. Failure to
    /// open or to read the stored schema is a connection error.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let connection = |e: fjall::Error| {
            DbError::Connection(format!("cannot open {}: {e}", path.display()))
        };
        let keyspace = Config::new(&path).open().map_err(connection)?;
        let open = |name: &str| {
            keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(connection)
        };
        let documents = open("documents")?;
        let indexes = open("indexes")?;
        let meta = open("meta")?;

        let schema = load_schema(&meta).map_err(|e| {
            DbError::Connection(format!("unreadable schema in {}: {e}", path.display()))
        })?;
        debug!(
            path = %path.display(),
            next_id = schema.next_id,
            indexes = schema.indexes.values().map(Vec::len).sum::<usize>(),
            "opened document keyspace"
        );
        Ok(Self {
            path,
            keyspace,
            documents,
            indexes,
            meta,
            schema: RwLock::new(schema),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Matching documents with their ids, at most `limit` of them.
    fn scan(
        &self,
        schema: &Schema,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> DbResult<Vec<(u64, Document)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if let Some(key) = point_key(schema, collection, filter) {
            let Some(id) = self.indexes.get(&key)? else {
                return Ok(Vec::new());
            };
            let id = decode_id(&id)?;
            let Some(bytes) = self.documents.get(doc_key(collection, id))? else {
                return Err(DbError::Backend(format!(
                    "{collection}: index entry points at missing document {id}"
                )));
            };
            let doc: Document = serde_json::from_slice(&bytes)?;
            return Ok(if filter.matches(&doc) {
                vec![(id, doc)]
            } else {
                Vec::new()
            });
        }

        let prefix = collection_prefix(collection);
        let mut out = Vec::new();
        for item in self.documents.prefix(&prefix) {
            let (key, bytes) = item?;
            let doc: Document = serde_json::from_slice(&bytes)?;
            if filter.matches(&doc) {
                out.push((decode_id(&key[prefix.len()..])?, doc));
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: Batch) -> DbResult<()> {
        batch.commit()?;
        if let Err(e) = self.keyspace.persist(PersistMode::SyncAll) {
            warn!(path = %self.path.display(), error = %e, "failed to sync document keyspace");
            return Err(e.into());
        }
        Ok(())
    }

    fn read_schema(&self) -> DbResult<RwLockReadGuard<'_, Schema>> {
        self.schema
            .read()
            .map_err(|e| DbError::Backend(format!("lock poisoned: {e}")))
    }

    fn write_schema(&self) -> DbResult<RwLockWriteGuard<'_, Schema>> {
        self.schema
            .write()
            .map_err(|e| DbError::Backend(format!("lock poisoned: {e}")))
    }
}

impl std::fmt::Debug for FjallDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallDocumentStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DocumentStore for FjallDocumentStore {
    #[instrument(skip_all, fields(backend = "fjall", collection = collection))]
    fn create_unique_index(&self, collection: &str, fields: &[&str]) -> DbResult<()> {
        let index: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let mut schema = self.write_schema()?;
        if schema.indexes(collection).contains(&index) {
            return Ok(());
        }

        let mut batch = self.keyspace.batch();
        let mut seen = HashSet::new();
        for (id, doc) in self.scan(&schema, collection, &Filter::new(), usize::MAX)? {
            let Some(key) = entry_key(collection, &index, |f| doc.get(f)) else {
                continue;
            };
            if !seen.insert(key.clone()) {
                return Err(DbError::AlreadyExists(format!(
                    "{collection}: existing documents collide on ({})",
                    describe_key(&index, &doc)
                )));
            }
            batch.insert(&self.indexes, key, id.to_be_bytes().to_vec());
        }
        batch.insert(
            &self.meta,
            index_def_key(collection, &index),
            serde_json::to_vec(&index)?,
        );
        self.commit(batch)?;
        debug!(fields = ?index, entries = seen.len(), "unique index created");
        schema.indexes.entry(collection.to_string()).or_default().push(index);
        Ok(())
    }

    #[instrument(skip_all, fields(backend = "fjall", collection = collection))]
    fn insert_one(&self, collection: &str, doc: Document) -> DbResult<()> {
        let mut schema = self.write_schema()?;
        let id = schema.next_id;
        let mut batch = self.keyspace.batch();
        for index in schema.indexes(collection) {
            let Some(key) = entry_key(collection, index, |f| doc.get(f)) else {
                continue;
            };
            if self.indexes.contains_key(&key)? {
                return Err(DbError::AlreadyExists(format!(
                    "{collection}: ({})",
                    describe_key(index, &doc)
                )));
            }
            batch.insert(&self.indexes, key, id.to_be_bytes().to_vec());
        }
        batch.insert(&self.documents, doc_key(collection, id), serde_json::to_vec(&doc)?);
        batch.insert(&self.meta, NEXT_ID, (id + 1).to_be_bytes().to_vec());
        self.commit(batch)?;
        schema.next_id = id + 1;
        debug!(id, "document inserted");
        Ok(())
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> DbResult<Option<Document>> {
        let schema = self.read_schema()?;
        Ok(self
            .scan(&schema, collection, filter, 1)?
            .into_iter()
            .next()
            .map(|(_, doc)| doc))
    }

    fn find(&self, collection: &str, filter: &Filter) -> DbResult<Vec<Document>> {
        let schema = self.read_schema()?;
        Ok(self
            .scan(&schema, collection, filter, usize::MAX)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect())
    }

    #[instrument(skip_all, fields(backend = "fjall", collection = collection, filter = %filter))]
    fn update_one(&self, collection: &str, filter: &Filter, set: Document) -> DbResult<()> {
        let schema = self.write_schema()?;
        let Some((id, current)) = self.scan(&schema, collection, filter, 1)?.into_iter().next()
        else {
            return Err(DbError::NotFound(format!("{collection}: {filter}")));
        };
        let mut updated = current.clone();
        updated.extend(set);

        let mut batch = self.keyspace.batch();
        for index in schema.indexes(collection) {
            let old = entry_key(collection, index, |f| current.get(f));
            let new = entry_key(collection, index, |f| updated.get(f));
            if old == new {
                continue;
            }
            if let Some(new) = new {
                if self.indexes.contains_key(&new)? {
                    return Err(DbError::AlreadyExists(format!(
                        "{collection}: ({})",
                        describe_key(index, &updated)
                    )));
                }
                batch.insert(&self.indexes, new, id.to_be_bytes().to_vec());
            }
            if let Some(old) = old {
                batch.remove(&self.indexes, old);
            }
        }
        batch.insert(&self.documents, doc_key(collection, id), serde_json::to_vec(&updated)?);
        self.commit(batch)?;
        debug!(id, "document updated");
        Ok(())
    }

    #[instrument(skip_all, fields(backend = "fjall", collection = collection, filter = %filter))]
    fn delete_many(&self, collection: &str, filter: &Filter) -> DbResult<u64> {
        let schema = self.write_schema()?;
        let doomed = self.scan(&schema, collection, filter, usize::MAX)?;
        if doomed.is_empty() {
            return Ok(0);
        }
        let mut batch = self.keyspace.batch();
        for (id, doc) in &doomed {
            for index in schema.indexes(collection) {
                if let Some(key) = entry_key(collection, index, |f| doc.get(f)) {
                    batch.remove(&self.indexes, key);
                }
            }
            batch.remove(&self.documents, doc_key(collection, *id));
        }
        self.commit(batch)?;
        debug!(removed = doomed.len(), "documents deleted");
        Ok(doomed.len() as u64)
    }

    fn count(&self, collection: &str, filter: &Filter) -> DbResult<u64> {
        let schema = self.read_schema()?;
        Ok(self.scan(&schema, collection, filter, usize::MAX)?.len() as u64)
    }

    fn sum(&self, collection: &str, filter: &Filter, field: &str) -> DbResult<u64> {
        let schema = self.read_schema()?;
        let docs = self.scan(&schema, collection, filter, usize::MAX)?;
        sum_field(collection, field, docs.iter().map(|(_, doc)| doc))
    }

    fn ping(&self) -> DbResult<()> {
        let _schema = self.read_schema()?;
        self.meta
            .get(NEXT_ID)
            .map_err(|e| DbError::Connection(e.to_string()))?;
        match self.path.try_exists() {
            Ok(true) => Ok(()),
            Ok(false) => Err(DbError::Connection(format!(
                "{} disappeared",
                self.path.display()
            ))),
            Err(e) => Err(DbError::Connection(e.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "fjall"
    }
}

// ---------------------------------------------------------------------------
// Key layout
// ---------------------------------------------------------------------------

fn collection_prefix(collection: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(collection.len() + 1);
    key.extend_from_slice(collection.as_bytes());
    key.push(0);
    key
}

fn doc_key(collection: &str, id: u64) -> Vec<u8> {
    let mut key = collection_prefix(collection);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> DbResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DbError::Backend(format!("malformed document id: {bytes:?}")))?;
    Ok(u64::from_be_bytes(raw))
}

fn fields_tag(index: &[String]) -> String {
    // A JSON array keeps field names containing separators unambiguous.
    serde_json::Value::from(index.to_vec()).to_string()
}

/// Index entry key for the values `lookup` yields for `index`, or `None`
/// when any field is absent. Absent fields never collide.
fn entry_key<'a>(
    collection: &str,
    index: &[String],
    lookup: impl Fn(&str) -> Option<&'a Value>,
) -> Option<Vec<u8>> {
    let mut key = collection_prefix(collection);
    key.extend_from_slice(fields_tag(index).as_bytes());
    for field in index {
        key.push(0);
        key.extend_from_slice(lookup(field)?.to_string().as_bytes());
    }
    Some(key)
}

/// Index key when `filter` pins every field of some unique index.
fn point_key(schema: &Schema, collection: &str, filter: &Filter) -> Option<Vec<u8>> {
    schema
        .indexes(collection)
        .iter()
        .find_map(|index| entry_key(collection, index, |f| filter.value_of(f)))
}

fn index_def_key(collection: &str, index: &[String]) -> Vec<u8> {
    let mut key = INDEX_DEF_PREFIX.to_vec();
    key.extend_from_slice(&collection_prefix(collection));
    key.extend_from_slice(fields_tag(index).as_bytes());
    key
}

fn load_schema(meta: &PartitionHandle) -> DbResult<Schema> {
    let mut schema = Schema::default();
    if let Some(raw) = meta.get(NEXT_ID)? {
        schema.next_id = decode_id(&raw)?;
    }
    for item in meta.prefix(INDEX_DEF_PREFIX) {
        let (key, value) = item?;
        let rest = &key[INDEX_DEF_PREFIX.len()..];
        let Some(end) = rest.iter().position(|b| *b == 0) else {
            return Err(DbError::Backend(format!("malformed index key: {key:?}")));
        };
        let collection = String::from_utf8(rest[..end].to_vec())
            .map_err(|e| DbError::Backend(e.to_string()))?;
        let index: Vec<String> = serde_json::from_slice(&value)?;
        schema.indexes.entry(collection).or_default().push(index);
    }
    Ok(schema)
}
