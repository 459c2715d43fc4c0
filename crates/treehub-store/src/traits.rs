use std::io::{Read, Write};

use treehub_types::{Namespace, ObjectId};

use crate::error::StoreResult;

/// Blob plane: byte storage keyed by `(namespace, ObjectId)`.
///
/// All implementations must satisfy these invariants:
/// - `store_stream` replaces an existing blob only after the entire stream
///   was copied; a failed copy leaves the previous blob (or its absence)
///   untouched.
/// - `read_full` fails with `NotFound` when no blob exists.
/// - `exists` is a presence check only.
/// - Operations on one `(namespace, id)` never affect another.
pub trait ObjectStore: Send + Sync {
    /// Write the full stream as the blob of `id`, returning bytes written.
    fn store_stream(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        reader: &mut dyn Read,
    ) -> StoreResult<u64>;

    /// Copy the full blob of `id` into `writer`, returning bytes copied.
    fn read_full(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        writer: &mut dyn Write,
    ) -> StoreResult<u64>;

    /// Whether a blob for `id` is present.
    fn exists(&self, namespace: &Namespace, id: &ObjectId) -> StoreResult<bool>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
