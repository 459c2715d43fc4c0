//! Documents, filters, and the document store abstraction.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DbError, DbResult};

/// A stored document: a flat JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Conjunction of field equality clauses. An empty filter matches every
/// document in a collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field == value` clause.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Value the first clause on `field` requires, if any.
    pub fn value_of(&self, field: &str) -> Option<&Value> {
        self.clauses
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}={value}")?;
        }
        f.write_str("}")
    }
}

/// Narrow document database interface used by the repositories.
///
/// Collections are created implicitly on first use. Every mutating call is
/// atomic with respect to other calls on the same store.
pub trait DocumentStore: Send + Sync {
    /// Register a unique index over `fields`. Idempotent. Fails with
    /// `AlreadyExists` if current documents already collide.
    fn create_unique_index(&self, collection: &str, fields: &[&str]) -> DbResult<()>;

    /// Insert a document. Fails with `AlreadyExists` on a unique index
    /// collision; the check and the insert are one atomic step.
    fn insert_one(&self, collection: &str, doc: Document) -> DbResult<()>;

    fn find_one(&self, collection: &str, filter: &Filter) -> DbResult<Option<Document>>;

    fn find(&self, collection: &str, filter: &Filter) -> DbResult<Vec<Document>>;

    /// Merge `set` into the first matching document. Fails with `NotFound`
    /// when nothing matches.
    fn update_one(&self, collection: &str, filter: &Filter, set: Document) -> DbResult<()>;

    /// Delete all matching documents, returning how many were removed.
    fn delete_many(&self, collection: &str, filter: &Filter) -> DbResult<u64>;

    fn count(&self, collection: &str, filter: &Filter) -> DbResult<u64>;

    /// Sum of the unsigned integer `field` over matching documents.
    fn sum(&self, collection: &str, filter: &Filter, field: &str) -> DbResult<u64>;

    /// Cheap liveness check.
    fn ping(&self) -> DbResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// `field=value` pairs of `index` in `doc`, for error messages.
pub(crate) fn describe_key(index: &[String], doc: &Document) -> String {
    let parts: Vec<String> = index
        .iter()
        .map(|f| format!("{f}={}", doc.get(f).unwrap_or(&Value::Null)))
        .collect();
    parts.join(", ")
}

/// Saturating sum of the unsigned integer `field`. Missing and null values
/// count as zero; anything else is a serialization error.
pub(crate) fn sum_field<'a>(
    collection: &str,
    field: &str,
    docs: impl IntoIterator<Item = &'a Document>,
) -> DbResult<u64> {
    let mut total: u64 = 0;
    for doc in docs {
        let value = match doc.get(field) {
            None | Some(Value::Null) => 0,
            Some(v) => v.as_u64().ok_or_else(|| {
                DbError::Serialization(format!(
                    "{collection}.{field} is not an unsigned integer: {v}"
                ))
            })?,
        };
        total = total.saturating_add(value);
    }
    Ok(total)
}

/// Serialize a record into a [`Document`].
pub fn to_document<T: Serialize>(value: &T) -> DbResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DbError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a record out of a [`Document`].
pub fn from_document<T: DeserializeOwned>(doc: Document) -> DbResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
