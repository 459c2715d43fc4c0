//! HTTP server for TreeHub.
//!
//! Exposes the object and ref services to OSTree clients under `/api/v2`
//! and `/api/v3`, plus liveness and readiness checks. Backends are chosen by
//! [`ServerConfig`] and can be swapped at runtime through the
//! [`ServiceRegistry`].

pub mod body;
pub mod config;
pub mod error;
pub mod factory;
pub mod handler;
pub mod registry;
pub mod router;
pub mod server;

pub use config::{DbConfig, ServerConfig, StorageConfig};
pub use error::{ApiError, ApiResult, ErrorBody, ServerError, ServerResult};
pub use registry::{ServiceRegistry, Services};
pub use server::TreehubServer;
