use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_stream::Stream;

use super::error::RegistryError;
use super::types::{ComponentName, ConstructionPolicy, RegistryStats, ServiceKey, UserHandle};
use crate::config::RegistryConfig;
use crate::services::event::{EventError, RegistryEvent, RegistryEventBus};
use crate::services::handle::{DisconnectListener, HandleFactory, ServiceHandle};

/// 服务注册表：每个 (组件, 用户) 最多缓存一个存活句柄
///
/// 句柄在首次 `acquire` 时懒创建，在句柄自身发出断开通知时移除。
/// 克隆共享同一份缓存。
pub struct ServiceRegistry<F: HandleFactory> {
    inner: Arc<RegistryInner<F>>,
}

struct RegistryInner<F: HandleFactory> {
    cache: DashMap<ServiceKey, Arc<F::Handle>>,
    // 正在构造的键 -> 构造锁，只有同一个键的调用方会互相等待
    constructing: DashMap<ServiceKey, Arc<Mutex<()>>>,
    factory: F,
    policy: ConstructionPolicy,
    events: RegistryEventBus,
    created_total: AtomicU64,
    evicted_total: AtomicU64,
    discarded_total: AtomicU64,
    stale_notifications: AtomicU64,
}

// 交给句柄的监听器，只持有弱引用，注册表释放后通知直接忽略
struct RegistryListener<F: HandleFactory> {
    inner: Weak<RegistryInner<F>>,
}

impl<F: HandleFactory> DisconnectListener<F::Handle> for RegistryListener<F> {
    fn on_disconnected(&self, handle: &F::Handle) {
        match self.inner.upgrade() {
            Some(inner) => inner.release(handle),
            None => tracing::trace!(
                service = %handle.key(),
                "Registry already dropped, ignoring disconnect notification"
            ),
        }
    }
}

impl<F: HandleFactory> Clone for ServiceRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: HandleFactory> fmt::Debug for ServiceRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("cached_services", &self.inner.cache.len())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl<F: HandleFactory> ServiceRegistry<F> {
    /// 使用指定工厂和注册表配置创建空注册表
    pub fn new(factory: F, config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                cache: DashMap::new(),
                constructing: DashMap::new(),
                factory,
                policy: config.construction_policy,
                events: RegistryEventBus::new(config.event_channel_capacity),
                created_total: AtomicU64::new(0),
                evicted_total: AtomicU64::new(0),
                discarded_total: AtomicU64::new(0),
                stale_notifications: AtomicU64::new(0),
            }),
        }
    }

    /// 使用默认配置创建注册表
    pub fn with_factory(factory: F) -> Self {
        Self::new(factory, RegistryConfig::default())
    }

    /// 获取 (组件, 用户) 对应的句柄，未命中时通过工厂创建并缓存
    ///
    /// 两次断开之间对同一身份的所有调用返回同一个 `Arc`。工厂失败时不缓存、不重试。
    pub fn acquire(
        &self,
        component: &ComponentName,
        user: UserHandle,
    ) -> Result<Arc<F::Handle>, RegistryError> {
        let key = ServiceKey::new(component.clone(), user);
        match self.inner.policy {
            ConstructionPolicy::Serialized => self.acquire_serialized(key),
            ConstructionPolicy::Optimistic => self.acquire_optimistic(key),
        }
    }

    // 同一个键的构造通过键级构造锁串行，工厂运行期间不持有任何缓存分片锁
    fn acquire_serialized(&self, key: ServiceKey) -> Result<Arc<F::Handle>, RegistryError> {
        if let Some(existing) = self.inner.cached(&key) {
            tracing::debug!(service = %key, "Service cache hit");
            return Ok(existing);
        }

        let slot = self.inner.construction_slot(&key);
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            // 等待构造锁期间其他调用方可能已经完成构造
            match self.inner.cached(&key) {
                Some(existing) => {
                    tracing::debug!(
                        service = %key,
                        "Service cache hit after waiting for construction"
                    );
                    Ok(existing)
                }
                None => self
                    .construct(&key)
                    .map(|handle| self.insert_constructed(key.clone(), handle)),
            }
        };
        self.inner.release_slot(&key, &slot);
        result
    }

    // 锁外构造，插入时若已有句柄则关闭自己构造的句柄
    fn acquire_optimistic(&self, key: ServiceKey) -> Result<Arc<F::Handle>, RegistryError> {
        if let Some(existing) = self.inner.cached(&key) {
            tracing::debug!(service = %key, "Service cache hit");
            return Ok(existing);
        }

        let handle = self.construct(&key)?;
        Ok(self.insert_constructed(key, handle))
    }

    // 插入新构造的句柄，返回最终缓存中的句柄
    fn insert_constructed(&self, key: ServiceKey, handle: Arc<F::Handle>) -> Arc<F::Handle> {
        match self.inner.cache.entry(key) {
            Entry::Occupied(entry) => {
                let winner = entry.get().clone();
                let key = entry.key().clone();
                // 关闭前释放分片锁，落败句柄的断开通知会回到本注册表
                drop(entry);

                tracing::warn!(
                    service = %key,
                    "Concurrent construction lost the race, closing discarded handle"
                );
                self.inner.discarded_total.fetch_add(1, Ordering::Relaxed);
                handle.close();
                self.inner.events.publish(RegistryEvent::Discarded { key });
                winner
            }
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                entry.insert(handle.clone());
                self.inner.record_created(&key);

                // 构造与插入之间已断开的句柄，其通知可能早于插入到达
                if handle.is_disconnected() {
                    self.inner.release(handle.as_ref());
                }
                handle
            }
        }
    }

    fn construct(&self, key: &ServiceKey) -> Result<Arc<F::Handle>, RegistryError> {
        let listener: Arc<dyn DisconnectListener<F::Handle>> = Arc::new(RegistryListener {
            inner: Arc::downgrade(&self.inner),
        });

        let handle = self
            .inner
            .factory
            .create(key.component(), key.user(), listener)
            .map_err(|source| {
                tracing::warn!(service = %key, error = %source, "Failed to create service handle");
                RegistryError::Factory {
                    key: key.clone(),
                    source,
                }
            })?;

        // 键不一致的句柄缓存后永远无法被断开通知移除
        if handle.key() != key {
            let actual = handle.key().clone();
            tracing::error!(
                service = %key,
                actual = %actual,
                "Factory returned a handle for another identity, closing it"
            );
            handle.close();
            return Err(RegistryError::KeyMismatch {
                expected: key.clone(),
                actual,
            });
        }

        Ok(handle)
    }

    /// 句柄断开通知：仅当缓存中是同一个句柄实例时才移除
    pub fn on_disconnected(&self, handle: &F::Handle) {
        self.inner.release(handle);
    }

    /// 当前缓存的身份（按键排序）
    pub fn snapshot(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self
            .inner
            .cache
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// 输出缓存状态，供运维查看
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "service_cache:")?;
        for key in self.snapshot() {
            writeln!(out, "  {key}")?;
        }
        Ok(())
    }

    /// 查看缓存中的句柄，不会触发创建
    pub fn peek(&self, key: &ServiceKey) -> Option<Arc<F::Handle>> {
        self.inner.cached(key)
    }

    /// 当前缓存的全部句柄
    pub fn cached_handles(&self) -> Vec<Arc<F::Handle>> {
        self.inner
            .cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// 是否缓存了该身份
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.inner.cache.contains_key(key)
    }

    /// 缓存的句柄数量
    pub fn len(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cache.is_empty()
    }

    /// 并发未命中时使用的构造策略
    pub fn policy(&self) -> ConstructionPolicy {
        self.inner.policy
    }

    /// 注册表持有的句柄工厂
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// 获取注册表统计信息
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            cached_services: self.inner.cache.len(),
            created_total: self.inner.created_total.load(Ordering::Relaxed),
            evicted_total: self.inner.evicted_total.load(Ordering::Relaxed),
            discarded_total: self.inner.discarded_total.load(Ordering::Relaxed),
            stale_notifications: self.inner.stale_notifications.load(Ordering::Relaxed),
        }
    }

    /// 订阅注册表生命周期事件
    pub fn subscribe(&self) -> impl Stream<Item = Result<RegistryEvent, EventError>> + use<F> {
        self.inner.events.subscribe()
    }
}

impl<F: HandleFactory> RegistryInner<F> {
    fn cached(&self, key: &ServiceKey) -> Option<Arc<F::Handle>> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    fn construction_slot(&self, key: &ServiceKey) -> Arc<Mutex<()>> {
        self.constructing
            .entry(key.clone())
            .or_default()
            .value()
            .clone()
    }

    // 只剩映射表和当前调用方持有时移除构造锁，仍有等待者时保留
    fn release_slot(&self, key: &ServiceKey, slot: &Arc<Mutex<()>>) {
        self.constructing.remove_if(key, |_, current| {
            Arc::ptr_eq(current, slot) && Arc::strong_count(current) == 2
        });
    }

    fn record_created(&self, key: &ServiceKey) {
        self.created_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!(service = %key, "Cached new service handle");
        self.events
            .publish(RegistryEvent::Created { key: key.clone() });
    }

    // 按句柄实例而非仅按键移除，过期通知不会移除较新的句柄
    fn release(&self, handle: &F::Handle) {
        let key = handle.key();
        let removed = self
            .cache
            .remove_if(key, |_, cached| std::ptr::eq(Arc::as_ptr(cached), handle));

        if removed.is_some() {
            self.evicted_total.fetch_add(1, Ordering::Relaxed);
            tracing::info!(service = %key, "Service disconnected, removed from cache");
            self.events
                .publish(RegistryEvent::Evicted { key: key.clone() });
        } else {
            self.stale_notifications.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                service = %key,
                "Ignoring disconnect notification for a handle that is no longer cached"
            );
            self.events
                .publish(RegistryEvent::StaleNotification { key: key.clone() });
        }
    }
}
