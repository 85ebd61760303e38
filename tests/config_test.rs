use std::fs;

use service_repository::config::{Config, ConfigError};
use service_repository::services::{ComponentName, ConstructionPolicy};

const SAMPLE: &str = r#"
[registry]
construction_policy = "optimistic"
event_channel_capacity = 64

[channel]
connect_timeout_secs = 3
lazy = true

[logging]
filter = "service_repository=debug"

[[services]]
package = "com.android.phone"
class = "DialerService"
address = "http://127.0.0.1:50051"

[[services]]
package = "com.android.services.sip"
class = "SipConnectionService"
address = "http://127.0.0.1:50052"
"#;

#[test]
fn test_parse_full_config() {
    let config = Config::parse(SAMPLE).unwrap();

    assert_eq!(config.registry.construction_policy, ConstructionPolicy::Optimistic);
    assert_eq!(config.registry.event_channel_capacity, 64);
    assert_eq!(config.channel.connect_timeout().as_secs(), 3);
    assert!(config.channel.lazy);
    assert_eq!(config.logging.filter, "service_repository=debug");

    let endpoints = config.endpoints();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(
        endpoints[&ComponentName::new("com.android.phone", "DialerService")],
        "http://127.0.0.1:50051"
    );
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::parse("").unwrap();

    assert_eq!(config.registry.construction_policy, ConstructionPolicy::Serialized);
    assert_eq!(config.registry.event_channel_capacity, 256);
    assert_eq!(config.channel.connect_timeout_secs, 10);
    assert!(!config.channel.lazy);
    assert_eq!(config.logging.filter, "info");
    assert!(config.services.is_empty());
}

#[test]
fn test_duplicate_service_is_invalid() {
    let duplicated = r#"
[[services]]
package = "com.android.phone"
class = "DialerService"
address = "http://127.0.0.1:1"

[[services]]
package = "com.android.phone"
class = "DialerService"
address = "http://127.0.0.1:2"
"#;

    assert!(matches!(Config::parse(duplicated), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_zero_channel_capacity_is_invalid() {
    let config = "[registry]\nevent_channel_capacity = 0\n";
    assert!(matches!(Config::parse(config), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_unknown_policy_fails_to_parse() {
    let config = "[registry]\nconstruction_policy = \"eventually\"\n";
    assert!(matches!(Config::parse(config), Err(ConfigError::Parse(_))));
}

#[test]
fn test_env_overrides_file_values() {
    let path = std::env::temp_dir().join(format!("service-repo-{}.toml", uuid::Uuid::new_v4()));
    fs::write(&path, SAMPLE).unwrap();

    let vars = vec![
        (
            "SERVICE_REPO_CONFIG".to_string(),
            path.display().to_string(),
        ),
        (
            "SERVICE_REPO_CONSTRUCTION_POLICY".to_string(),
            "serialized".to_string(),
        ),
        ("SERVICE_REPO_LOG_FILTER".to_string(), "warn".to_string()),
        ("UNRELATED".to_string(), "ignored".to_string()),
    ];
    let config = Config::load_from_env(vars).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(config.registry.construction_policy, ConstructionPolicy::Serialized);
    assert_eq!(config.logging.filter, "warn");
    assert_eq!(config.services.len(), 2);
    assert!(config.channel.lazy);
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let path = std::env::temp_dir().join(format!("missing-{}.toml", uuid::Uuid::new_v4()));
    let vars = vec![("SERVICE_REPO_CONFIG".to_string(), path.display().to_string())];

    let config = Config::load_from_env(vars).unwrap();
    assert!(config.services.is_empty());
    assert_eq!(config.registry.construction_policy, ConstructionPolicy::Serialized);
}
