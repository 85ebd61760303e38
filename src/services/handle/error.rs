use thiserror::Error;

use crate::services::repository::types::ComponentName;

/// 句柄工厂错误类型
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("No endpoint configured for component: {component}")]
    UnknownComponent { component: ComponentName },

    #[error("Invalid endpoint {address} for component {component}: {source}")]
    InvalidEndpoint {
        component: ComponentName,
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("No Tokio runtime available to start the connection task")]
    NoRuntime,

    #[error("Handle factory has been shut down")]
    ShutDown,

    #[error("Handle construction failed: {0}")]
    Other(String),
}
