//! Blob plane for TreeHub.
//!
//! Durable byte storage for OSTree objects keyed by `(namespace, ObjectId)`.
//! The blob plane knows nothing about upload status: the metadata plane
//! (`treehub-db`) is authoritative for whether an object logically exists.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`LocalFsObjectStore`] -- fan-out directory tree under a root path
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A blob is written to a temporary file next to its final path and only
//!    moved into place after the whole stream copied successfully.
//! 2. A failed write never touches the blob at the final path.
//! 3. Existence is a path check only; content is never inspected.

pub mod error;
pub mod localfs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use localfs::LocalFsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
