//! Local filesystem blob store.
//!
//! Layout: `root/<namespace>/<sha[0:2]>/<sha[2:]>.<type>`.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument, warn};
use treehub_types::{Namespace, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// Blob store over a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    root: PathBuf,
}

impl LocalFsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        ensure_dir(&root).map_err(|source| StoreError::RootUnavailable {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "local blob store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one namespace. The namespace must be a single plain path
    /// component so that it cannot escape the root.
    fn namespace_dir(&self, namespace: &Namespace) -> StoreResult<PathBuf> {
        let ns = namespace.as_str();
        let mut components = Path::new(ns).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == ns && !ns.contains('\\') => {
                Ok(self.root.join(ns))
            }
            _ => Err(StoreError::InvalidNamespace(ns.to_string())),
        }
    }

    fn object_path(&self, namespace: &Namespace, id: &ObjectId) -> StoreResult<PathBuf> {
        Ok(id.path(self.namespace_dir(namespace)?))
    }
}

/// Create `path` and any missing parents; an existing directory is fine.
fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy `reader` into a temp file beside `path`, then swap it into place.
///
/// The temp file is removed on any failure before the rename. The
/// remove-then-rename pair is not atomic: a crash in between leaves no blob,
/// which the metadata plane tolerates.
fn safe_store_stream(path: &Path, reader: &mut dyn Read) -> io::Result<u64> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other(format!("{} has no parent", path.display())))?;
    ensure_dir(parent)?;

    let prefix = path
        .file_name()
        .map(|n| format!(".{}.", n.to_string_lossy()))
        .unwrap_or_else(|| ".blob.".to_string());
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)?;

    let written = io::copy(reader, &mut temp)?;
    temp.as_file().sync_all()?;

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    temp.persist(path).map_err(|e| e.error)?;
    Ok(written)
}

impl ObjectStore for LocalFsObjectStore {
    #[instrument(skip_all, fields(backend = "localfs", namespace = %namespace, object_id = %id))]
    fn store_stream(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        reader: &mut dyn Read,
    ) -> StoreResult<u64> {
        let path = self.object_path(namespace, id)?;
        debug!(path = %path.display(), "persisting stream into blob");
        match safe_store_stream(&path, reader) {
            Ok(written) => {
                debug!(path = %path.display(), size = written, "blob created");
                Ok(written)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to persist blob stream");
                Err(StoreError::Io(e))
            }
        }
    }

    #[instrument(skip_all, fields(backend = "localfs", namespace = %namespace, object_id = %id))]
    fn read_full(
        &self,
        namespace: &Namespace,
        id: &ObjectId,
        writer: &mut dyn Write,
    ) -> StoreResult<u64> {
        let path = self.object_path(namespace, id)?;
        let mut file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound {
                    namespace: namespace.clone(),
                    id: id.clone(),
                }
            } else {
                warn!(path = %path.display(), error = %e, "failed to open blob");
                StoreError::Io(e)
            }
        })?;
        let written = io::copy(&mut file, writer)?;
        debug!(path = %path.display(), size = written, "blob read completed");
        Ok(written)
    }

    #[instrument(skip_all, fields(backend = "localfs", namespace = %namespace, object_id = %id))]
    fn exists(&self, namespace: &Namespace, id: &ObjectId) -> StoreResult<bool> {
        let path = self.object_path(namespace, id)?;
        Ok(path.try_exists()?)
    }

    fn backend_name(&self) -> &'static str {
        "localfs"
    }
}
