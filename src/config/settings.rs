//! Runtime-editable settings.
//!
//! The four keys exposed by `/api/settings` and persisted to `settings.json`.
//! They start out as a projection of [`ManagerConfig`](super::ManagerConfig)
//! and are swapped atomically when the API changes them, so readers never
//! block on a writer.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::loader::ConfigError;

/// Current runtime settings. Serialized with upper-case keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "IP")]
    pub ip: String,

    #[serde(rename = "VMESS_PORT")]
    pub vmess_port: u16,

    #[serde(rename = "HOST_PORT")]
    pub host_port: u16,

    #[serde(rename = "SUBSCRIPTION_URL")]
    pub subscription_url: String,
}

/// A partial update. Absent or uncoercible keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub ip: Option<String>,
    pub vmess_port: Option<u16>,
    pub host_port: Option<u16>,
    pub subscription_url: Option<String>,
}

impl SettingsPatch {
    /// Build a patch from a loosely-typed JSON object.
    ///
    /// Ports accept numbers or numeric strings; anything else is skipped
    /// rather than rejected, as is a subscription path that does not start
    /// with `/` or that would shadow the API.
    pub fn from_json(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        Self {
            ip: map.get("IP").and_then(Value::as_str).map(str::to_string),
            vmess_port: map.get("VMESS_PORT").and_then(coerce_port),
            host_port: map.get("HOST_PORT").and_then(coerce_port),
            subscription_url: map
                .get("SUBSCRIPTION_URL")
                .and_then(Value::as_str)
                .filter(|path| is_valid_subscription_path(path))
                .map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply onto `settings`, returning whether any key was present.
    pub fn apply_to(&self, settings: &mut Settings) -> bool {
        if let Some(ip) = &self.ip {
            settings.ip = ip.clone();
        }
        if let Some(port) = self.vmess_port {
            settings.vmess_port = port;
        }
        if let Some(port) = self.host_port {
            settings.host_port = port;
        }
        if let Some(path) = &self.subscription_url {
            settings.subscription_url = path.clone();
        }
        !self.is_empty()
    }
}

pub(crate) fn is_valid_subscription_path(path: &str) -> bool {
    path.starts_with('/') && path != "/" && path != "/api" && !path.starts_with("/api/")
}

fn coerce_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }?;
    (port != 0).then_some(port)
}

/// Read the persisted overlay. Missing or unreadable files yield `None`.
pub fn load_overlay(path: &Path) -> Option<SettingsPatch> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read settings file");
            return None;
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(value) => Some(SettingsPatch::from_json(&value)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unparseable settings file");
            None
        }
    }
}

/// Shared holder of the live settings, persisted on every change.
pub struct SettingsStore {
    current: ArcSwap<Settings>,
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(initial: Settings, path: PathBuf) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            path,
        }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Apply a patch and persist the result.
    ///
    /// Returns the new settings, or `None` when the patch carried nothing.
    /// Callers serialize writers; concurrent `apply` calls may lose updates.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<Option<Arc<Settings>>, ConfigError> {
        let mut next = Settings::clone(&self.current.load());
        if !patch.apply_to(&mut next) {
            return Ok(None);
        }

        let body = serde_json::to_string_pretty(&next)?;
        fs::write(&self.path, body)?;

        let next = Arc::new(next);
        self.current.store(next.clone());
        tracing::info!(path = %self.path.display(), "Settings saved");
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Settings {
        Settings {
            ip: "127.0.0.1".into(),
            vmess_port: 51820,
            host_port: 8090,
            subscription_url: "/subscription".into(),
        }
    }

    #[test]
    fn test_patch_coerces_numeric_strings() {
        let patch = SettingsPatch::from_json(&json!({
            "VMESS_PORT": "10086",
            "HOST_PORT": 9000,
            "IP": "203.0.113.7",
        }));

        assert_eq!(patch.vmess_port, Some(10086));
        assert_eq!(patch.host_port, Some(9000));
        assert_eq!(patch.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(patch.subscription_url, None);
    }

    #[test]
    fn test_patch_skips_invalid_values() {
        let patch = SettingsPatch::from_json(&json!({
            "VMESS_PORT": "not-a-port",
            "HOST_PORT": 70000,
            "SUBSCRIPTION_URL": "/api/list",
            "UNKNOWN": true,
        }));

        assert!(patch.is_empty());
        assert!(SettingsPatch::from_json(&json!(["VMESS_PORT"])).is_empty());
    }

    #[test]
    fn test_settings_serialize_with_upper_case_keys() {
        let value = serde_json::to_value(settings()).unwrap();
        assert_eq!(value["VMESS_PORT"], 51820);
        assert_eq!(value["SUBSCRIPTION_URL"], "/subscription");
    }

    #[test]
    fn test_store_persists_and_swaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(settings(), path.clone());

        let patch = SettingsPatch {
            subscription_url: Some("/sub/secret".into()),
            ..Default::default()
        };
        let next = store.apply(&patch).unwrap().unwrap();

        assert_eq!(next.subscription_url, "/sub/secret");
        assert_eq!(store.current().subscription_url, "/sub/secret");

        let overlay = load_overlay(&path).unwrap();
        assert_eq!(overlay.subscription_url.as_deref(), Some("/sub/secret"));
        assert_eq!(overlay.vmess_port, Some(51820));
    }

    #[test]
    fn test_empty_patch_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(settings(), path.clone());

        assert!(store.apply(&SettingsPatch::default()).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_overlay_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(load_overlay(&path).is_none());
        assert!(load_overlay(&dir.path().join("missing.json")).is_none());
    }
}
