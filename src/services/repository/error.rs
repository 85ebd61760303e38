use thiserror::Error;

use super::types::ServiceKey;
use crate::services::handle::FactoryError;

/// 注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to create handle for {key}: {source}")]
    Factory {
        key: ServiceKey,
        #[source]
        source: FactoryError,
    },

    #[error("Factory returned a handle for {actual} when {expected} was requested")]
    KeyMismatch {
        expected: ServiceKey,
        actual: ServiceKey,
    },
}
