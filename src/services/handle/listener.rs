use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// 断开连接监听器：句柄的底层连接拆除时被调用
pub trait DisconnectListener<H: ?Sized>: Send + Sync {
    fn on_disconnected(&self, handle: &H);
}

/// 句柄携带的监听器集合，保证每个句柄生命周期内只通知一次
pub struct DisconnectNotifier<H: ?Sized> {
    listeners: Mutex<Vec<Arc<dyn DisconnectListener<H>>>>,
    fired: AtomicBool,
}

impl<H: ?Sized> DisconnectNotifier<H> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            fired: AtomicBool::new(false),
        }
    }

    /// 添加监听器；已经通知过则返回 false 且不会再调用它
    pub fn add_listener(&self, listener: Arc<dyn DisconnectListener<H>>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if self.fired.load(Ordering::Acquire) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// 按实例移除监听器
    pub fn remove_listener(&self, listener: &Arc<dyn DisconnectListener<H>>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| Arc::as_ptr(l) as *const () != target);
        listeners.len() != before
    }

    /// 通知所有监听器。只有第一次调用会真正触发，返回本次是否触发
    pub fn notify(&self, handle: &H) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        // 锁外回调，监听器可以安全地再次访问句柄
        let listeners = {
            let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for listener in listeners {
            listener.on_disconnected(handle);
        }
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<H: ?Sized> Default for DisconnectNotifier<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> fmt::Debug for DisconnectNotifier<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisconnectNotifier")
            .field("listeners", &self.listener_count())
            .field("fired", &self.is_fired())
            .finish()
    }
}
