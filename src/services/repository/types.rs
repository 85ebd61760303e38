use std::fmt;

use serde::{Deserialize, Serialize};

/// 服务组件名（包名 + 类名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// 执行上下文（用户）标识
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct UserHandle(pub u32);

impl UserHandle {
    pub const SYSTEM: UserHandle = UserHandle(0);
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserHandle{{{}}}", self.0)
    }
}

/// 缓存键：组件名 + 用户，两部分共同参与相等性与哈希
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    component: ComponentName,
    user: UserHandle,
}

impl ServiceKey {
    pub fn new(component: ComponentName, user: UserHandle) -> Self {
        Self { component, user }
    }

    pub fn component(&self) -> &ComponentName {
        &self.component
    }

    pub fn user(&self) -> UserHandle {
        self.user
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.component, self.user)
    }
}

/// 并发未命中时的构造策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionPolicy {
    /// 持有分片锁调用工厂，每个缓存周期只构造一次
    #[default]
    Serialized,
    /// 锁外构造，先插入者胜出，失败方关闭自己的句柄
    Optimistic,
}

// 注册表统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub cached_services: usize,
    pub created_total: u64,
    pub evicted_total: u64,
    pub discarded_total: u64,
    pub stale_notifications: u64,
}
