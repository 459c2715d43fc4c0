#[cfg(unix)]
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::Request;
use axum::ServiceExt;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::registry::ServiceRegistry;
use crate::router::{build_app, App};

/// TreeHub HTTP server.
pub struct TreehubServer {
    config: ServerConfig,
    registry: Arc<ServiceRegistry>,
}

impl TreehubServer {
    /// Wire services for `config`. Fails if a backend cannot be opened.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let registry = Arc::new(ServiceRegistry::from_config(&config)?);
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Build the full service stack (useful for testing).
    pub fn app(&self) -> App {
        build_app(AppState {
            registry: self.registry(),
            timeout: self.config.request_timeout(),
        })
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.app();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("TreeHub listening on {}", self.config.bind_addr);
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Reload configuration from `path` into `registry` on every SIGHUP.
#[cfg(unix)]
pub fn reload_on_sighup(registry: Arc<ServiceRegistry>, path: PathBuf) -> ServerResult<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!(path = %path.display(), "SIGHUP received, reloading config");
            let config = ServerConfig::load(&path).and_then(|mut c| {
                c.apply_env_overrides()?;
                Ok(c)
            });
            match config {
                // reload logs its own failure and keeps the old services
                Ok(config) => {
                    let _ = registry.reload(&config);
                }
                Err(e) => warn!(error = %e, "cannot reload config"),
            }
        }
    });
    Ok(())
}
