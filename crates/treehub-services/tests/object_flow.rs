//! End-to-end object uploads across both planes.

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use tempfile::tempdir;
use treehub_db::{
    DbError, DbResult, DocumentObjectRepository, FjallDocumentStore, InMemoryDocumentStore,
    ObjectRepository,
};
use treehub_services::ObjectService;
use treehub_store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};
use treehub_types::{Commit, ErrorKind, Namespace, Object, ObjectId, ObjectStatus};

fn commit_id(c: char) -> ObjectId {
    Commit::new(c.to_string().repeat(64)).unwrap().to_object_id()
}

/// Returns a few bytes, then fails like a dropped connection.
struct DroppingReader {
    sent: bool,
}

impl Read for DroppingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.sent {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"));
        }
        self.sent = true;
        buf[0] = b'x';
        Ok(1)
    }
}

/// Delegates to a real repository, optionally refusing updates and deletes.
struct FlakyRepo {
    inner: DocumentObjectRepository,
    fail_update: bool,
    fail_delete: bool,
}

impl FlakyRepo {
    fn new(fail_update: bool, fail_delete: bool) -> Self {
        Self {
            inner: DocumentObjectRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap(),
            fail_update,
            fail_delete,
        }
    }
}

impl ObjectRepository for FlakyRepo {
    fn create(&self, object: &Object) -> DbResult<()> {
        self.inner.create(object)
    }

    fn find(&self, ns: &Namespace, id: &ObjectId) -> DbResult<Object> {
        self.inner.find(ns, id)
    }

    fn update(&self, ns: &Namespace, id: &ObjectId, size: u64, status: ObjectStatus) -> DbResult<()> {
        if self.fail_update {
            return Err(DbError::Backend("update refused".into()));
        }
        self.inner.update(ns, id, size, status)
    }

    fn delete(&self, ns: &Namespace, id: &ObjectId) -> DbResult<bool> {
        if self.fail_delete {
            return Err(DbError::Backend("delete refused".into()));
        }
        self.inner.delete(ns, id)
    }

    fn exists(&self, ns: &Namespace, id: &ObjectId) -> DbResult<bool> {
        self.inner.exists(ns, id)
    }

    fn set_completed(&self, ns: &Namespace, id: &ObjectId) -> DbResult<()> {
        self.inner.set_completed(ns, id)
    }

    fn is_uploaded(&self, ns: &Namespace, id: &ObjectId) -> DbResult<bool> {
        self.inner.is_uploaded(ns, id)
    }

    fn find_all_by_status(&self, status: ObjectStatus) -> DbResult<Vec<Object>> {
        self.inner.find_all_by_status(status)
    }

    fn usage(&self, ns: &Namespace) -> DbResult<u64> {
        self.inner.usage(ns)
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn upload_then_download_on_disk() {
    let dir = tempdir().unwrap();
    let docs = Arc::new(FjallDocumentStore::open(dir.path().join("db")).unwrap());
    let repo = Arc::new(DocumentObjectRepository::new(docs).unwrap());
    let blobs = Arc::new(LocalFsObjectStore::new(dir.path().join("objects")).unwrap());
    let svc = ObjectService::new(repo.clone(), blobs);

    let ns = Namespace::new("t1");
    let id = commit_id('a');
    let payload = b"this is a commit object".to_vec();
    let n = payload.len() as u64;

    assert_eq!(
        svc.store_stream(&ns, &id, n, &mut Cursor::new(payload.clone()))
            .unwrap(),
        n
    );

    let mut out = Vec::new();
    assert_eq!(svc.read_full(&ns, &id, &mut out).unwrap(), n);
    assert_eq!(out, payload);
    assert!(svc.exists(&ns, &id).unwrap());
    assert_eq!(repo.find(&ns, &id).unwrap().status, ObjectStatus::Uploaded);
    assert!(repo.is_uploaded(&ns, &id).unwrap());
}

#[test]
fn reupload_replaces_content() {
    let repo = Arc::new(DocumentObjectRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap());
    let svc = ObjectService::new(repo.clone(), Arc::new(InMemoryObjectStore::new()));
    let ns = Namespace::new("t1");
    let id = commit_id('b');

    svc.store_stream(&ns, &id, 3, &mut Cursor::new(b"one".to_vec()))
        .unwrap();
    svc.store_stream(&ns, &id, 5, &mut Cursor::new(b"three".to_vec()))
        .unwrap();

    let mut out = Vec::new();
    svc.read_full(&ns, &id, &mut out).unwrap();
    assert_eq!(out, b"three");
    assert_eq!(repo.find(&ns, &id).unwrap().byte_size, 5);
}

// ---------------------------------------------------------------------------
// Existence needs both planes
// ---------------------------------------------------------------------------

#[test]
fn one_sided_presence_is_not_existence() {
    let repo = Arc::new(DocumentObjectRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap());
    let blobs = Arc::new(InMemoryObjectStore::new());
    let svc = ObjectService::new(repo.clone(), blobs.clone());
    let ns = Namespace::new("t1");

    // Metadata only.
    let meta_only = commit_id('c');
    repo.create(&Object::uploading(ns.clone(), meta_only.clone(), 10))
        .unwrap();
    assert!(!svc.exists(&ns, &meta_only).unwrap());

    // Blob only.
    let blob_only = commit_id('d');
    blobs
        .store_stream(&ns, &blob_only, &mut Cursor::new(vec![1, 2, 3]))
        .unwrap();
    assert!(!svc.exists(&ns, &blob_only).unwrap());
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[test]
fn failed_blob_write_removes_record() {
    let dir = tempdir().unwrap();
    let repo = Arc::new(DocumentObjectRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap());
    let blobs = Arc::new(LocalFsObjectStore::new(dir.path()).unwrap());
    let svc = ObjectService::new(repo.clone(), blobs);
    let ns = Namespace::new("t1");
    let id = commit_id('e');

    let err = svc
        .store_stream(&ns, &id, 10, &mut DroppingReader { sent: false })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageOperation);
    assert!(!repo.exists(&ns, &id).unwrap());
    assert!(!svc.exists(&ns, &id).unwrap());
}

#[test]
fn failed_metadata_update_removes_record() {
    let repo = Arc::new(FlakyRepo::new(true, false));
    let svc = ObjectService::new(repo.clone(), Arc::new(InMemoryObjectStore::new()));
    let ns = Namespace::new("t1");
    let id = commit_id('f');

    let err = svc
        .store_stream(&ns, &id, 2, &mut Cursor::new(vec![0, 1]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageOperation);
    assert!(!repo.exists(&ns, &id).unwrap());
}

#[test]
fn failed_compensation_leaves_discoverable_orphan() {
    let repo = Arc::new(FlakyRepo::new(true, true));
    let svc = ObjectService::new(repo.clone(), Arc::new(InMemoryObjectStore::new()));
    let ns = Namespace::new("t1");
    let id = commit_id('1');

    // The triggering error is returned, not the compensation failure.
    let err = svc
        .store_stream(&ns, &id, 2, &mut Cursor::new(vec![0, 1]))
        .unwrap_err();
    assert!(err.to_string().contains("update refused"));

    let orphans = svc.pending_uploads().unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].id, id);
    assert_eq!(orphans[0].status, ObjectStatus::ServerUploading);
}

#[test]
fn set_completed_without_record_is_not_found() {
    let repo = Arc::new(DocumentObjectRepository::new(Arc::new(InMemoryDocumentStore::new())).unwrap());
    let svc = ObjectService::new(repo, Arc::new(InMemoryObjectStore::new()));
    let err = svc
        .set_completed(&Namespace::new("t1"), &commit_id('2'))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
