//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ManagerConfig;
use crate::config::settings::load_overlay;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and persistence.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration using the process environment.
pub fn load_config(file: Option<&Path>, data_dir: Option<&Path>) -> Result<ManagerConfig, ConfigError> {
    load_config_with(file, data_dir, |key| std::env::var(key).ok())
}

/// Load and validate configuration.
///
/// Precedence, lowest first: defaults, TOML file, environment, the
/// persisted `settings.json` overlay.
pub fn load_config_with<F>(
    file: Option<&Path>,
    data_dir: Option<&Path>,
    env: F,
) -> Result<ManagerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match file {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ManagerConfig::default(),
    };

    if let Some(dir) = data_dir {
        config.storage.data_dir = dir.to_path_buf();
    }

    apply_env(&mut config, env);

    if let Some(patch) = load_overlay(&config.storage.settings_file()) {
        let mut settings = config.settings();
        patch.apply_to(&mut settings);
        config.apply_settings(&settings);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the environment overrides understood by the container image.
///
/// Integers that fail to parse are ignored.
pub fn apply_env<F>(config: &mut ManagerConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ip) = env("IP") {
        config.vmess.public_ip = ip;
    }
    if let Some(port) = env("VMESS_PORT").and_then(|v| v.trim().parse().ok()) {
        config.vmess.port = port;
    }
    if let Some(port) = env("HOST_PORT").and_then(|v| v.trim().parse().ok()) {
        config.server.port = port;
    }
    if let Some(path) = env("SUBSCRIPTION_URL") {
        config.subscription.path = path;
    }
    if let Some(binary) = env("V2RAY_BIN") {
        config.daemon.binary = binary.into();
    }
    if let Some(debug) = env("DEBUG") {
        config.observability.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_with(
            None,
            Some(dir.path()),
            env_from(&[("IP", "198.51.100.4"), ("VMESS_PORT", "443"), ("DEBUG", "Yes")]),
        )
        .unwrap();

        assert_eq!(config.vmess.public_ip, "198.51.100.4");
        assert_eq!(config.vmess.port, 443);
        assert!(config.observability.debug);
    }

    #[test]
    fn test_unparseable_env_ports_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_with(
            None,
            Some(dir.path()),
            env_from(&[("VMESS_PORT", "eighty"), ("HOST_PORT", "")]),
        )
        .unwrap();

        assert_eq!(config.vmess.port, 51820);
        assert_eq!(config.server.port, 8090);
    }

    #[test]
    fn test_settings_overlay_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"VMESS_PORT": "2053", "SUBSCRIPTION_URL": "/feed"}"#,
        )
        .unwrap();

        let config = load_config_with(None, Some(dir.path()), env_from(&[("VMESS_PORT", "443")])).unwrap();

        assert_eq!(config.vmess.port, 2053);
        assert_eq!(config.subscription.path, "/feed");
    }

    #[test]
    fn test_toml_file_and_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("manager.toml");
        fs::write(&file, "[subscription]\npath = \"feed\"\n[daemon]\nstop_grace_secs = 0\n").unwrap();

        let err = load_config_with(Some(&file), Some(dir.path()), env_from(&[])).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }
}
