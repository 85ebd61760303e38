use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use uuid::Uuid;

use super::types::{ConnectionState, DisconnectReason};
use crate::services::handle::{DisconnectListener, DisconnectNotifier, ServiceHandle};
use crate::services::repository::types::ServiceKey;

/// 指向远端 gRPC 服务的句柄
///
/// 连接由后台任务建立并维持，直到解绑或工厂关闭。断开时先通知监听器，
/// 随后状态才变为 `Disconnected`。
#[derive(Debug)]
pub struct ChannelHandle {
    id: Uuid,
    key: ServiceKey,
    address: String,
    channel: RwLock<Option<Channel>>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    notifier: DisconnectNotifier<ChannelHandle>,
}

impl ChannelHandle {
    pub(crate) fn new(key: ServiceKey, address: String, shutdown: CancellationToken) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            id: Uuid::new_v4(),
            key,
            address,
            channel: RwLock::new(None),
            state,
            shutdown,
            notifier: DisconnectNotifier::new(),
        }
    }

    /// 每次构造都会生成新的 id，用于在日志中区分同一身份的前后两个句柄
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 构造时解析出的服务地址
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 当前连接状态的快照
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// 已连接时返回 gRPC 通道
    pub fn channel(&self) -> Option<Channel> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 追加断开监听器；句柄已断开时返回 false
    pub fn add_listener(&self, listener: Arc<dyn DisconnectListener<ChannelHandle>>) -> bool {
        self.notifier.add_listener(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DisconnectListener<ChannelHandle>>) -> bool {
        self.notifier.remove_listener(listener)
    }

    /// 请求解绑，断开通知由后台任务异步发出
    pub fn unbind(&self) {
        tracing::debug!(service = %self.key, handle_id = %self.id, "Unbind requested");
        self.shutdown.cancel();
    }

    /// 等待连接尝试结束，已连接时返回通道
    pub async fn ready(&self) -> Option<Channel> {
        let mut rx = self.state.subscribe();
        let _ = rx
            .wait_for(|state| !matches!(state, ConnectionState::Connecting))
            .await;
        self.channel()
    }

    /// 等待句柄断开，返回最终状态
    pub async fn wait_disconnected(&self) -> ConnectionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(ConnectionState::is_disconnected).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    // 仅在尚未断开时记录通道
    fn mark_connected(&self, channel: Channel) -> bool {
        let mut guard = self.channel.write().unwrap_or_else(PoisonError::into_inner);
        if self.notifier.is_fired() {
            return false;
        }
        *guard = Some(channel);
        self.state.send_replace(ConnectionState::Connected);
        true
    }

    fn disconnect(&self, reason: DisconnectReason) {
        if !self.notifier.notify(self) {
            return;
        }

        tracing::info!(
            service = %self.key,
            handle_id = %self.id,
            reason = %reason,
            "Service handle disconnected"
        );

        let mut guard = self.channel.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        self.state
            .send_replace(ConnectionState::Disconnected { reason });
    }
}

impl ServiceHandle for ChannelHandle {
    fn key(&self) -> &ServiceKey {
        &self.key
    }

    fn close(&self) {
        self.unbind();
    }

    fn is_disconnected(&self) -> bool {
        self.notifier.is_fired()
    }
}

// 句柄后台任务：建立连接（或使用懒连接通道），然后等待解绑或工厂关闭
pub(crate) async fn run_handle(
    handle: Arc<ChannelHandle>,
    endpoint: Endpoint,
    lazy: bool,
    factory_shutdown: CancellationToken,
) {
    let token = handle.shutdown.clone();

    if lazy {
        handle.mark_connected(endpoint.connect_lazy());
    } else {
        tokio::select! {
            _ = token.cancelled() => {}
            result = endpoint.connect() => match result {
                Ok(channel) => {
                    if handle.mark_connected(channel) {
                        tracing::info!(
                            service = %handle.key,
                            handle_id = %handle.id,
                            address = %handle.address,
                            "Connected to remote service"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        service = %handle.key,
                        handle_id = %handle.id,
                        address = %handle.address,
                        error = %err,
                        "Failed to connect to remote service"
                    );
                    handle.disconnect(DisconnectReason::ConnectFailed(err.to_string()));
                    return;
                }
            },
        }
    }

    token.cancelled().await;

    let reason = if factory_shutdown.is_cancelled() {
        DisconnectReason::Shutdown
    } else {
        DisconnectReason::Unbound
    };
    handle.disconnect(reason);
}
