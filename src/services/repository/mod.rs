//! Repository module
//!
//! The service handle cache, split into:
//! - `types`: identity key and statistics
//! - `service`: `ServiceRegistry` acquire/evict logic
//! - `error`: registry error type

pub mod error;
pub mod service;
pub mod types;

pub use error::RegistryError;
pub use service::ServiceRegistry;
pub use types::{ComponentName, ConstructionPolicy, RegistryStats, ServiceKey, UserHandle};
