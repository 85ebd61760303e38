//! Handle module
//!
//! Contracts shared between the repository and the connection layer:
//! - `factory`: `ServiceHandle` and `HandleFactory` traits
//! - `listener`: single-fire disconnect notification
//! - `error`: factory failures

pub mod error;
pub mod factory;
pub mod listener;

pub use error::FactoryError;
pub use factory::{HandleFactory, ServiceHandle};
pub use listener::{DisconnectListener, DisconnectNotifier};
