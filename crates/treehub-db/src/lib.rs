//! Metadata plane for TreeHub.
//!
//! This crate persists the two record types of the system:
//!
//! - **Object records** (`objects` collection): size and upload status per
//!   `(namespace, ObjectId)`. The record is authoritative for whether an
//!   object logically exists.
//! - **Refs** (`refs` collection): `(namespace, name)` → commit.
//!
//! Both repositories are written against the narrow [`DocumentStore`]
//! abstraction (filtered create/find/update/delete/count/aggregate), so any
//! document database can back them.
//!
//! # Modules
//!
//! - [`document`] -- [`Document`], [`Filter`], and the [`DocumentStore`] trait
//! - [`memory`] -- [`InMemoryDocumentStore`] for tests and ephemeral servers
//! - [`keyspace`] -- [`FjallDocumentStore`], a durable store on an embedded
//!   LSM keyspace with keyed unique indexes
//! - [`object_repo`] -- [`ObjectRepository`] and its document-backed impl
//! - [`ref_repo`] -- [`RefRepository`] and its document-backed impl

mod collection;
pub mod document;
pub mod error;
pub mod keyspace;
pub mod memory;
pub mod object_repo;
pub mod ref_repo;

pub use document::{Document, DocumentStore, Filter};
pub use error::{DbError, DbResult};
pub use keyspace::FjallDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use object_repo::{DocumentObjectRepository, ObjectRepository};
pub use ref_repo::{DocumentRefRepository, RefRepository};
