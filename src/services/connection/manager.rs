use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tonic::transport::Endpoint;

use super::connection::{ChannelHandle, run_handle};
use crate::config::{ChannelConfig, Config};
use crate::services::handle::{DisconnectListener, FactoryError, HandleFactory, ServiceHandle};
use crate::services::repository::types::{ComponentName, ServiceKey, UserHandle};

/// 基于 tonic 通道的句柄工厂，按组件名解析远端地址
#[derive(Debug)]
pub struct ChannelHandleFactory {
    // 组件名 -> 服务地址
    endpoints: HashMap<ComponentName, String>,
    config: ChannelConfig,
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl ChannelHandleFactory {
    pub fn new(endpoints: HashMap<ComponentName, String>, config: ChannelConfig) -> Self {
        Self {
            endpoints,
            config,
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.endpoints(), config.channel.clone())
    }

    pub fn address_for(&self, component: &ComponentName) -> Option<&str> {
        self.endpoints.get(component).map(String::as_str)
    }

    // 仍在运行的句柄任务数量
    pub fn active_tasks(&self) -> usize {
        self.task_tracker.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 断开所有由本工厂创建的句柄并等待后台任务结束
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        tracing::info!("Channel handle factory shut down");
    }
}

impl HandleFactory for ChannelHandleFactory {
    type Handle = ChannelHandle;

    fn create(
        &self,
        component: &ComponentName,
        user: UserHandle,
        listener: Arc<dyn DisconnectListener<ChannelHandle>>,
    ) -> Result<Arc<ChannelHandle>, FactoryError> {
        if self.shutdown.is_cancelled() {
            return Err(FactoryError::ShutDown);
        }

        let address = self
            .endpoints
            .get(component)
            .cloned()
            .ok_or_else(|| FactoryError::UnknownComponent {
                component: component.clone(),
            })?;

        let endpoint = Endpoint::from_shared(address.clone())
            .map_err(|source| FactoryError::InvalidEndpoint {
                component: component.clone(),
                address: address.clone(),
                source,
            })?
            .connect_timeout(self.config.connect_timeout());

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FactoryError::NoRuntime)?;

        let handle = Arc::new(ChannelHandle::new(
            ServiceKey::new(component.clone(), user),
            address,
            self.shutdown.child_token(),
        ));
        // 先注册监听器，再启动可能发出通知的后台任务
        handle.add_listener(listener);

        tracing::debug!(
            service = %handle.key(),
            handle_id = %handle.id(),
            address = %handle.address(),
            lazy = self.config.lazy,
            "Starting service handle"
        );

        self.task_tracker.spawn_on(
            run_handle(
                handle.clone(),
                endpoint,
                self.config.lazy,
                self.shutdown.clone(),
            ),
            &runtime,
        );

        Ok(handle)
    }
}

impl Drop for ChannelHandleFactory {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.task_tracker.close();
    }
}
