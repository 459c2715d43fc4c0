//! Ref protocol against a durable document store.

use std::sync::Arc;

use tempfile::tempdir;
use treehub_db::{DocumentRefRepository, FjallDocumentStore, InMemoryDocumentStore};
use treehub_services::{RefService, ServiceError};
use treehub_types::{ErrorKind, Namespace, RefName};

fn in_memory() -> RefService {
    RefService::new(Arc::new(
        DocumentRefRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap(),
    ))
}

fn main_ref() -> RefName {
    RefName::new("heads/main").unwrap()
}

#[test]
fn fresh_namespace_create_and_get() {
    let svc = in_memory();
    let ns = Namespace::new("t1");
    svc.store_ref(&ns, &main_ref(), &"a".repeat(64), false)
        .unwrap();
    let r = svc.get_ref(&ns, &main_ref()).unwrap();
    assert_eq!(r.object_id.as_str(), format!("{}.commit", "a".repeat(64)));
    assert!(svc.exists(&ns, &main_ref()).unwrap());
}

#[test]
fn existing_ref_without_force_is_unchanged() {
    let svc = in_memory();
    let ns = Namespace::new("t1");
    svc.store_ref(&ns, &main_ref(), &"a".repeat(64), false)
        .unwrap();

    let err = svc
        .store_ref(&ns, &main_ref(), &"b".repeat(64), false)
        .unwrap_err();
    assert!(matches!(err, ServiceError::RefExists { .. }));
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(
        svc.get_ref(&ns, &main_ref()).unwrap().value.as_str(),
        "a".repeat(64)
    );
}

#[test]
fn existing_ref_with_force_is_overwritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let ns = Namespace::new("t1");
    {
        let docs = Arc::new(FjallDocumentStore::open(&path).unwrap());
        let svc = RefService::new(Arc::new(DocumentRefRepository::new(docs).unwrap()));
        svc.store_ref(&ns, &main_ref(), &"a".repeat(64), false)
            .unwrap();
        svc.store_ref(&ns, &main_ref(), &"b".repeat(64), true)
            .unwrap();
    }

    // Reopen to check the overwrite was persisted.
    let docs = Arc::new(FjallDocumentStore::open(&path).unwrap());
    let svc = RefService::new(Arc::new(DocumentRefRepository::new(docs).unwrap()));
    let r = svc.get_ref(&ns, &main_ref()).unwrap();
    assert_eq!(r.value.as_str(), "b".repeat(64));
    assert_eq!(r.object_id.as_str(), format!("{}.commit", "b".repeat(64)));
}

#[test]
fn force_on_missing_ref_creates_it() {
    let svc = in_memory();
    let ns = Namespace::default();
    svc.store_ref(&ns, &main_ref(), &"c".repeat(64), true)
        .unwrap();
    assert!(svc.exists(&ns, &main_ref()).unwrap());
}

#[test]
fn refs_are_namespaced() {
    let svc = in_memory();
    svc.store_ref(&Namespace::new("t1"), &main_ref(), &"a".repeat(64), false)
        .unwrap();
    assert!(!svc.exists(&Namespace::new("t2"), &main_ref()).unwrap());
    let err = svc
        .get_ref(&Namespace::new("t2"), &main_ref())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
