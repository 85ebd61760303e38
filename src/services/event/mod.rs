pub mod event_bus;
pub mod types;

pub use event_bus::RegistryEventBus;
pub use types::{EventError, RegistryEvent};
