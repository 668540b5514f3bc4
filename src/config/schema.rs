//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::settings::Settings;

/// Root configuration for the manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// HTTP server (API, subscription, frontend).
    pub server: ServerConfig,

    /// Parameters advertised to clients and written into inbounds.
    pub vmess: VmessConfig,

    /// Subscription endpoint settings.
    pub subscription: SubscriptionConfig,

    /// On-disk layout.
    pub storage: StorageConfig,

    /// The supervised proxy daemon.
    pub daemon: DaemonConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ManagerConfig {
    /// Runtime-editable subset of the configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            ip: self.vmess.public_ip.clone(),
            vmess_port: self.vmess.port,
            host_port: self.server.port,
            subscription_url: self.subscription.path.clone(),
        }
    }

    /// Fold runtime settings back into the static configuration.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.vmess.public_ip = settings.ip.clone();
        self.vmess.port = settings.vmess_port;
        self.server.port = settings.host_port;
        self.subscription.path = settings.subscription_url.clone();
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port for the API and subscription endpoint (`HOST_PORT`).
    pub port: u16,
}

impl ServerConfig {
    /// Bind address in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
        }
    }
}

/// VMess inbound configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VmessConfig {
    /// Address clients connect to (`IP`).
    pub public_ip: String,

    /// Port the daemon's inbound listens on (`VMESS_PORT`).
    pub port: u16,
}

impl Default for VmessConfig {
    fn default() -> Self {
        Self {
            public_ip: "127.0.0.1".to_string(),
            port: 51820,
        }
    }
}

/// Subscription endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Exact request path serving the list file (`SUBSCRIPTION_URL`).
    pub path: String,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            path: "/subscription".to_string(),
        }
    }
}

/// On-disk layout. Relative paths resolve against `data_dir`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub list_file: PathBuf,
    pub running_file: PathBuf,
    pub settings_file: PathBuf,
    pub frontend_dist: PathBuf,
}

impl StorageConfig {
    /// Every path anchored under a new data directory.
    pub fn rooted_at(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.resolve(&self.config_dir)
    }

    pub fn list_file(&self) -> PathBuf {
        self.resolve(&self.list_file)
    }

    pub fn running_file(&self) -> PathBuf {
        self.resolve(&self.running_file)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.resolve(&self.settings_file)
    }

    pub fn frontend_dist(&self) -> PathBuf {
        self.resolve(&self.frontend_dist)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            config_dir: PathBuf::from("configs"),
            list_file: PathBuf::from("list.txt"),
            running_file: PathBuf::from("running.json"),
            settings_file: PathBuf::from("settings.json"),
            frontend_dist: PathBuf::from("frontend/dist"),
        }
    }
}

/// Supervised daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to the proxy binary (`V2RAY_BIN`).
    pub binary: PathBuf,

    /// Arguments placed before the active configuration path.
    pub args: Vec<String>,

    /// Seconds to wait after SIGTERM before force-killing.
    pub stop_grace_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/v2ray/v2ray"),
            args: vec!["run".to_string(), "-config".to_string()],
            stop_grace_secs: 3,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format for the fmt layer.
    pub log_format: LogFormat,

    /// Forces debug-level logging (`DEBUG`).
    pub debug: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            debug: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
