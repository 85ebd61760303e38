pub mod connection;
pub mod manager;
pub mod types;

pub use connection::*;
pub use manager::*;
pub use types::*;
