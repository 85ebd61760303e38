use std::sync::Arc;

use super::error::FactoryError;
use super::listener::DisconnectListener;
use crate::services::repository::types::{ComponentName, ServiceKey, UserHandle};

/// 注册表缓存的服务句柄
pub trait ServiceHandle: Send + Sync + 'static {
    /// 句柄自身的身份，注册表据此定位缓存条目
    fn key(&self) -> &ServiceKey;

    /// 主动拆除连接。实现方须在拆除后通知一次监听器
    fn close(&self);

    /// 是否已经发出过断开通知
    fn is_disconnected(&self) -> bool;
}

/// 为 (组件, 用户) 构造新句柄的工厂
pub trait HandleFactory: Send + Sync + 'static {
    type Handle: ServiceHandle;

    /// 构造句柄并把 `listener` 注册到句柄上
    ///
    /// 返回的句柄的 `key()` 必须等于 `(component, user)`。调用期间注册表不持有缓存锁，
    /// 句柄可以在返回前就发出断开通知，也可以获取其他身份的句柄；
    /// 但不能在 `create` 内再次获取同一身份，否则会等待自己的构造锁。
    fn create(
        &self,
        component: &ComponentName,
        user: UserHandle,
        listener: Arc<dyn DisconnectListener<Self::Handle>>,
    ) -> Result<Arc<Self::Handle>, FactoryError>;
}

impl<F: HandleFactory> HandleFactory for Arc<F> {
    type Handle = F::Handle;

    fn create(
        &self,
        component: &ComponentName,
        user: UserHandle,
        listener: Arc<dyn DisconnectListener<Self::Handle>>,
    ) -> Result<Arc<Self::Handle>, FactoryError> {
        (**self).create(component, user, listener)
    }
}
