//! Core services of TreeHub.
//!
//! [`ObjectService`] keeps the metadata plane (object records) and the blob
//! plane (bytes) consistent across uploads, downloads, and existence checks.
//! [`RefService`] implements the create / force-update protocol for refs.
//!
//! Both services are synchronous and cheap to clone; callers on an async
//! runtime are expected to run them on a blocking pool.

pub mod error;
pub mod object_service;
pub mod ref_service;

pub use error::{ServiceError, ServiceResult};
pub use object_service::ObjectService;
pub use ref_service::RefService;
