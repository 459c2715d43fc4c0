//! Foundation types for TreeHub.
//!
//! TreeHub stores namespaced, content-addressed OSTree objects and mutable
//! named refs pointing at commits. This crate holds the pure identity layer
//! shared by every other TreeHub crate: nothing here touches storage.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- `<sha256-hex>.<type>` content-addressed identifier
//! - [`Commit`] -- 64-char lowercase sha256 naming a tree snapshot
//! - [`DeltaId`] -- `<from>-<to>` pair of modified-base64 commit encodings
//! - [`Namespace`] -- tenant isolation key threaded through every operation
//! - [`Object`] / [`ObjectStatus`] -- metadata record for a stored object
//! - [`Ref`] / [`RefName`] -- mutable named pointer to a commit
//! - [`ErrorKind`] -- closed classification shared by all TreeHub errors

pub mod commit;
pub mod delta;
pub mod error;
pub mod hashing;
pub mod namespace;
pub mod object;
pub mod object_id;
pub mod reference;

pub use commit::Commit;
pub use delta::DeltaId;
pub use error::{ErrorKind, TypeError};
pub use hashing::{digest, valid_hex};
pub use namespace::{Namespace, DEFAULT_NAMESPACE};
pub use object::{Object, ObjectStatus};
pub use object_id::ObjectId;
pub use reference::{Ref, RefName};
