//! Service wiring and hot replacement.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use treehub_db::{DocumentObjectRepository, DocumentRefRepository, DocumentStore};
use treehub_services::{ObjectService, RefService};

use crate::config::{DbConfig, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::factory;

/// One consistent set of services built from a single configuration.
pub struct Services {
    pub db: DbConfig,
    pub documents: Arc<dyn DocumentStore>,
    pub objects: ObjectService,
    pub refs: RefService,
}

impl Services {
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        Self::assemble(config, None)
    }

    /// Build services for `config`. A durable document store that `current`
    /// already holds open for the same configuration is shared rather than
    /// opened a second time.
    fn assemble(config: &ServerConfig, current: Option<&Services>) -> ServerResult<Self> {
        let documents = match current {
            Some(current)
                if current.db == config.db && matches!(config.db, DbConfig::Fjall { .. }) =>
            {
                debug!(backend = current.documents.backend_name(), "reusing open document store");
                Arc::clone(&current.documents)
            }
            _ => factory::build_document_store(&config.db)?,
        };
        let blobs = factory::build_object_store(&config.storage)?;
        let object_repo = DocumentObjectRepository::new(documents.clone())?;
        let ref_repo = DocumentRefRepository::new(documents.clone())?;
        Ok(Self {
            db: config.db.clone(),
            objects: ObjectService::new(Arc::new(object_repo), blobs),
            refs: RefService::new(Arc::new(ref_repo)),
            documents,
        })
    }
}

/// Owns the live [`Services`]. Requests take a snapshot with
/// [`current`](Self::current); a reload swaps the whole set at once and
/// never disturbs snapshots already handed out.
pub struct ServiceRegistry {
    current: Mutex<Arc<Services>>,
}

impl ServiceRegistry {
    pub fn new(services: Services) -> Self {
        Self {
            current: Mutex::new(Arc::new(services)),
        }
    }

    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        Ok(Self::new(Services::from_config(config)?))
    }

    pub fn current(&self) -> ServerResult<Arc<Services>> {
        let guard = self
            .current
            .lock()
            .map_err(|e| ServerError::Internal(format!("registry lock poisoned: {e}")))?;
        Ok(Arc::clone(&guard))
    }

    /// Build services for `config` and install them. On failure the
    /// previous services stay in place.
    pub fn reload(&self, config: &ServerConfig) -> ServerResult<()> {
        let current = self.current()?;
        let next = match Services::assemble(config, Some(&*current)) {
            Ok(services) => Arc::new(services),
            Err(e) => {
                warn!(error = %e, "reload failed, keeping current services");
                return Err(e);
            }
        };
        let mut guard = self
            .current
            .lock()
            .map_err(|e| ServerError::Internal(format!("registry lock poisoned: {e}")))?;
        *guard = next;
        info!("services reloaded");
        Ok(())
    }
}
