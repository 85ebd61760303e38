use thiserror::Error;

use crate::services::repository::types::ServiceKey;

/// 注册表生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// 缓存未命中，新句柄已缓存
    Created { key: ServiceKey },
    /// 句柄断开，条目已移除
    Evicted { key: ServiceKey },
    /// 并发竞争中落败的句柄已关闭丢弃
    Discarded { key: ServiceKey },
    /// 断开通知对应的句柄已不在缓存中
    StaleNotification { key: ServiceKey },
}

impl RegistryEvent {
    pub fn key(&self) -> &ServiceKey {
        match self {
            RegistryEvent::Created { key }
            | RegistryEvent::Evicted { key }
            | RegistryEvent::Discarded { key }
            | RegistryEvent::StaleNotification { key } => key,
        }
    }
}

/// 事件订阅错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Subscriber lagged behind, {0} events skipped")]
    Lagged(u64),
}
