//! Ref create / force-update protocol.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use treehub_db::RefRepository;
use treehub_types::{Commit, Namespace, Ref, RefName};

use crate::error::{ServiceError, ServiceResult};

/// Stores and resolves refs.
#[derive(Clone)]
pub struct RefService {
    repo: Arc<dyn RefRepository>,
}

impl RefService {
    pub fn new(repo: Arc<dyn RefRepository>) -> Self {
        Self { repo }
    }

    /// Point `name` at `commit`.
    ///
    /// The commit is validated before storage is touched. An existing ref is
    /// only overwritten when `force` is set; otherwise `RefExists` is
    /// returned and the stored value is left alone.
    #[instrument(skip_all, fields(namespace = %namespace, ref_name = %name, force = force))]
    pub fn store_ref(
        &self,
        namespace: &Namespace,
        name: &RefName,
        commit: &str,
        force: bool,
    ) -> ServiceResult<Ref> {
        let value = Commit::new(commit).inspect_err(|e| warn!(error = %e, "ref is invalid"))?;
        let reference = Ref::new(namespace.clone(), name.clone(), value);

        if self.repo.exists(namespace, name)? {
            if !force {
                warn!("ref already exists and force is not set");
                return Err(ServiceError::RefExists {
                    namespace: namespace.clone(),
                    name: name.clone(),
                });
            }
            self.repo.update(&reference)?;
            debug!(value = %reference.value, "ref overwritten");
        } else {
            self.repo.create(&reference)?;
            debug!(value = %reference.value, "ref created");
        }
        Ok(reference)
    }

    /// Load the ref, or `NotFound`.
    pub fn get_ref(&self, namespace: &Namespace, name: &RefName) -> ServiceResult<Ref> {
        Ok(self.repo.find(namespace, name)?)
    }

    /// Whether a ref named `name` is stored.
    pub fn exists(&self, namespace: &Namespace, name: &RefName) -> ServiceResult<bool> {
        Ok(self.repo.exists(namespace, name)?)
    }
}

impl std::fmt::Debug for RefService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefService").finish_non_exhaustive()
    }
}
