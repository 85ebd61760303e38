use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use super::types::{EventError, RegistryEvent};

/// 基于 Tokio broadcast 的注册表事件总线
#[derive(Debug, Clone)]
pub struct RegistryEventBus {
    sender: broadcast::Sender<RegistryEvent>,
}

impl RegistryEventBus {
    pub fn new(capacity: usize) -> Self {
        // broadcast::channel 不接受 0 容量
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 发布事件，返回收到事件的订阅者数量；没有订阅者时返回 0
    pub fn publish(&self, event: RegistryEvent) -> usize {
        match self.sender.send(event) {
            Ok(subscriber_count) => subscriber_count,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event = ?event, "No active subscribers for registry event");
                0
            }
        }
    }

    /// 订阅注册表事件流
    pub fn subscribe(&self) -> impl Stream<Item = Result<RegistryEvent, EventError>> + use<> {
        BroadcastStream::new(self.sender.subscribe()).map(|result| {
            result.map_err(|err| match err {
                BroadcastStreamRecvError::Lagged(skipped) => EventError::Lagged(skipped),
            })
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
