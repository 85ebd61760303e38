use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::repository::types::{ComponentName, ConstructionPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_PREFIX: &str = "SERVICE_REPO_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
    pub services: Vec<ServiceEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub construction_policy: ConstructionPolicy,
    pub event_channel_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            construction_policy: ConstructionPolicy::default(),
            event_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub connect_timeout_secs: u64,
    /// 懒连接：不在创建时建立连接
    pub lazy: bool,
}

impl ChannelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            lazy: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// 服务组件与其远端地址
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub package: String,
    pub class: String,
    pub address: String,
}

impl ServiceEndpoint {
    pub fn component(&self) -> ComponentName {
        ComponentName::new(&self.package, &self.class)
    }
}

// 可通过 SERVICE_REPO_* 环境变量覆盖的字段
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    config: Option<PathBuf>,
    construction_policy: Option<ConstructionPolicy>,
    log_filter: Option<String>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// 从进程环境变量定位并加载配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_env(std::env::vars())
    }

    /// 配置文件不存在时使用默认配置，环境变量覆盖文件中的值
    pub fn load_from_env<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        let path = overrides
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        if let Some(policy) = overrides.construction_policy {
            config.registry.construction_policy = policy;
        }
        if let Some(filter) = overrides.log_filter {
            config.logging.filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&config_str)
    }

    pub fn parse(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "registry.event_channel_capacity must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            let component = service.component();
            if !seen.insert(component.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate service entry for {component}"
                )));
            }
        }

        Ok(())
    }

    /// 组件名 -> 地址映射
    pub fn endpoints(&self) -> HashMap<ComponentName, String> {
        self.services
            .iter()
            .map(|service| (service.component(), service.address.clone()))
            .collect()
    }
}
