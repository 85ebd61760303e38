pub mod connection;
pub mod event;
pub mod handle;
pub mod repository;

pub use handle::{DisconnectListener, DisconnectNotifier, FactoryError, HandleFactory, ServiceHandle};
pub use repository::{
    ComponentName, ConstructionPolicy, RegistryError, RegistryStats, ServiceKey, ServiceRegistry,
    UserHandle,
};
