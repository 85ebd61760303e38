#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use service_repository::services::{
    ComponentName, DisconnectListener, DisconnectNotifier, FactoryError, HandleFactory,
    ServiceHandle, ServiceKey, UserHandle,
};

// 测试用句柄，记录是否被关闭
#[derive(Debug)]
pub struct FakeHandle {
    pub key: ServiceKey,
    pub serial: usize,
    closed: AtomicBool,
    notifier: DisconnectNotifier<FakeHandle>,
}

impl FakeHandle {
    /// 模拟底层连接断开
    pub fn disconnect(&self) -> bool {
        self.notifier.notify(self)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ServiceHandle for FakeHandle {
    fn key(&self) -> &ServiceKey {
        &self.key
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notifier.notify(self);
    }

    fn is_disconnected(&self) -> bool {
        self.notifier.is_fired()
    }
}

// 测试用工厂，记录每一次构造
#[derive(Default)]
pub struct FakeFactory {
    created: AtomicUsize,
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    failing: HashSet<ComponentName>,
    delay: Option<Duration>,
    barrier: Option<Barrier>,
    disconnect_on_create: bool,
    disconnect_from_thread: bool,
    reported_user: Option<UserHandle>,
    held: Option<(ComponentName, Mutex<Receiver<()>>)>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// 所有构造调用在 barrier 处汇合后才返回
    pub fn with_barrier(parties: usize) -> Self {
        Self {
            barrier: Some(Barrier::new(parties)),
            ..Self::default()
        }
    }

    pub fn failing_for(component: ComponentName) -> Self {
        Self {
            failing: HashSet::from([component]),
            ..Self::default()
        }
    }

    /// 返回前已经断开的句柄
    pub fn disconnecting() -> Self {
        Self {
            disconnect_on_create: true,
            ..Self::default()
        }
    }

    /// 返回前由另一个线程断开句柄，并等待该线程结束
    pub fn disconnecting_from_thread() -> Self {
        Self {
            disconnect_from_thread: true,
            ..Self::default()
        }
    }

    /// 句柄报告的用户与请求的用户不一致
    pub fn reporting_user(user: UserHandle) -> Self {
        Self {
            reported_user: Some(user),
            ..Self::default()
        }
    }

    /// 指定组件的构造会一直等待，直到返回的发送端发出信号
    pub fn holding(component: ComponentName) -> (Self, Sender<()>) {
        let (release, held) = mpsc::channel();
        let factory = Self {
            held: Some((component, Mutex::new(held))),
            ..Self::default()
        };
        (factory, release)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn handles(&self) -> Vec<Arc<FakeHandle>> {
        self.handles.lock().unwrap().clone()
    }
}

impl HandleFactory for FakeFactory {
    type Handle = FakeHandle;

    fn create(
        &self,
        component: &ComponentName,
        user: UserHandle,
        listener: Arc<dyn DisconnectListener<FakeHandle>>,
    ) -> Result<Arc<FakeHandle>, FactoryError> {
        if self.failing.contains(component) {
            return Err(FactoryError::Other(format!("cannot bind {component}")));
        }

        let serial = self.created.fetch_add(1, Ordering::SeqCst);
        if let Some((held_component, release)) = &self.held {
            if held_component == component {
                release.lock().unwrap().recv().unwrap();
            }
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }

        let handle = Arc::new(FakeHandle {
            key: ServiceKey::new(component.clone(), self.reported_user.unwrap_or(user)),
            serial,
            closed: AtomicBool::new(false),
            notifier: DisconnectNotifier::new(),
        });
        handle.notifier.add_listener(listener);
        self.handles.lock().unwrap().push(handle.clone());

        if self.disconnect_on_create {
            handle.disconnect();
        }
        if self.disconnect_from_thread {
            let remote = handle.clone();
            let fired = std::thread::spawn(move || remote.disconnect())
                .join()
                .unwrap();
            assert!(fired);
        }
        Ok(handle)
    }
}

pub fn dialer() -> ComponentName {
    ComponentName::new("com.android.phone", "DialerService")
}

pub fn sip() -> ComponentName {
    ComponentName::new("com.android.services.sip", "SipConnectionService")
}
