//! TOML file configuration structures.
//!
//! These structs directly map to the `knorten-config.toml` file format.
//! Every section is optional.

use knorten_sdk::objects::EventClass;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port of the operator API (e.g., "127.0.0.1:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

/// Dispatcher tuning section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Deadline extension applied when an event is retried.
    #[serde(default = "default_error_grace_secs")]
    pub error_grace_secs: i64,
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Unbounded when absent.
    #[serde(default)]
    pub max_concurrent_workers: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            error_grace_secs: default_error_grace_secs(),
            max_retries: default_max_retries(),
            max_concurrent_workers: None,
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    10
}

fn default_error_grace_secs() -> i64 {
    180
}

fn default_max_retries() -> i32 {
    5
}

/// Maintenance section. Reloaded on SIGHUP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default)]
    pub paused_classes: Vec<EventClass>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "0.0.0.0:3000"

[dispatcher]
tick_interval_secs = 5
error_grace_secs = 60
max_retries = 3
max_concurrent_workers = 4

[maintenance]
paused_classes = ["airflow", "usersecret"]
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.dispatcher.tick_interval_secs, 5);
        assert_eq!(config.dispatcher.error_grace_secs, 60);
        assert_eq!(config.dispatcher.max_retries, 3);
        assert_eq!(config.dispatcher.max_concurrent_workers, Some(4));
        assert_eq!(
            config.maintenance.paused_classes,
            vec![EventClass::Airflow, EventClass::UserSecret]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.dispatcher.tick_interval_secs, 10);
        assert_eq!(config.dispatcher.error_grace_secs, 180);
        assert_eq!(config.dispatcher.max_retries, 5);
        assert_eq!(config.dispatcher.max_concurrent_workers, None);
        assert!(config.maintenance.paused_classes.is_empty());
    }

    #[test]
    fn test_unknown_class_rejected() {
        let toml_str = r#"
[maintenance]
paused_classes = ["spaceships"]
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
