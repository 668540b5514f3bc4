//! Orchestration of store mutations and daemon restarts.
//!
//! # Responsibilities
//! - Serialize every config-mutating operation through one write lock
//! - Restart the daemon after each mutation, while still holding the lock
//! - Keep runtime settings and the active listener port in step
//!
//! # Design Decisions
//! - Lock order is always write lock → supervisor lock
//! - The store finishes writing before the restart begins
//! - Restart failures are logged; the store outcome is still returned
//! - Store file I/O runs on the blocking pool, never on a runtime worker

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::codec::DecodedLink;
use crate::config::{ConfigError, ManagerConfig, Settings, SettingsPatch, SettingsStore};
use crate::daemon::{DaemonCommand, Supervisor};
use crate::observability::metrics;
use crate::store::{ClearOutcome, ConfigStore, CreatedClient, DeleteOutcome, StoreError, StorePaths};

/// Liveness report for `/api/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    pub ok: bool,
    #[serde(rename = "v2ray_running")]
    pub daemon_running: bool,
}

pub struct Manager {
    store: Arc<ConfigStore>,
    supervisor: Supervisor,
    settings: SettingsStore,
    write_lock: tokio::sync::Mutex<()>,
}

impl Manager {
    pub fn new(store: ConfigStore, supervisor: Supervisor, settings: SettingsStore) -> Self {
        Self {
            store: Arc::new(store),
            supervisor,
            settings,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Wire every component from a loaded configuration.
    pub fn from_config(config: &ManagerConfig) -> Self {
        let paths = StorePaths::from(&config.storage);
        let command = DaemonCommand::from_config(&config.daemon, paths.running_file.clone());
        let supervisor = Supervisor::new(command, Duration::from_secs(config.daemon.stop_grace_secs));
        let settings = SettingsStore::new(config.settings(), config.storage.settings_file());
        Self::new(ConfigStore::new(paths), supervisor, settings)
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Bring the on-disk state to a runnable shape before the first start.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let settings = self.settings.current();

        let created = self
            .blocking(move |store| {
                store.ensure_layout()?;
                let created = store.bootstrap(&settings)?;
                store.sync_listener_port(settings.vmess_port)?;
                Ok(created)
            })
            .await?;
        if let Some(created) = created {
            tracing::info!(name = %created.descriptor.name, link = %created.link, "Generated default client");
        }
        Ok(())
    }

    /// Start the daemon; failures are logged and leave it stopped.
    pub async fn start_daemon(&self) {
        if let Err(e) = self.supervisor.start().await {
            tracing::error!(error = %e, "Daemon not started");
        }
    }

    /// Stop the daemon for process exit.
    pub async fn shutdown(&self) {
        let _guard = self.write_lock.lock().await;
        let outcome = self.supervisor.stop().await;
        tracing::info!(?outcome, "Daemon shut down");
    }

    /// Stored clients. Read failures are logged and yield an empty list.
    pub async fn list_clients(&self) -> Vec<DecodedLink> {
        self.blocking(|store| store.list()).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read client list");
            Vec::new()
        })
    }

    pub async fn find_client(&self, name: &str) -> Option<DecodedLink> {
        let owned = name.to_string();
        self.blocking(move |store| store.find(&owned)).await.unwrap_or_else(|e| {
            tracing::warn!(name = %name, error = %e, "Failed to read client list");
            None
        })
    }

    pub async fn create_client(&self, name: &str) -> Result<CreatedClient, StoreError> {
        let name = name.to_string();
        let created = self.mutate(move |store, settings| store.create(&name, settings)).await?;
        metrics::record_client_created();
        Ok(created)
    }

    pub async fn delete_client(&self, name: &str) -> Result<DeleteOutcome, StoreError> {
        let name = name.to_string();
        let outcome = self.mutate(move |store, _| store.delete(&name)).await?;
        if outcome.fragment_removed || outcome.list_entries_removed > 0 {
            metrics::record_client_deleted();
        }
        Ok(outcome)
    }

    pub async fn clear_clients(&self) -> Result<ClearOutcome, StoreError> {
        self.mutate(|store, settings| store.clear(settings.vmess_port)).await
    }

    /// Apply a settings patch. A `VMESS_PORT` change moves the active
    /// listener and restarts the daemon.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Arc<Settings>, ConfigError> {
        let _guard = self.write_lock.lock().await;

        let Some(next) = self.settings.apply(patch)? else {
            return Ok(self.settings.current());
        };

        if patch.vmess_port.is_some() {
            let port = next.vmess_port;
            if let Err(e) = self.blocking(move |store| store.update_listener_port(port)).await {
                tracing::warn!(error = %e, "Failed to move active listener");
            }
            self.restart_daemon().await;
        }
        Ok(next)
    }

    pub async fn health(&self) -> Health {
        Health {
            ok: true,
            daemon_running: self.supervisor.is_running().await,
        }
    }

    /// Run a store operation on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ConfigStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store)).await?
    }

    async fn mutate<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ConfigStore, &Settings) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let settings = self.settings.current();

        let result = self.blocking(move |store| op(store, &settings)).await;
        match &result {
            // Rejected before any file was touched.
            Err(StoreError::AlreadyExists(_) | StoreError::InvalidName(_)) => {}
            _ => self.restart_daemon().await,
        }
        result
    }

    async fn restart_daemon(&self) {
        match self.supervisor.restart().await {
            Ok(outcome) => tracing::debug!(pid = outcome.pid(), "Daemon restarted"),
            Err(e) => tracing::error!(error = %e, "Daemon restart failed"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn manager() -> (TempDir, Manager) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ManagerConfig::default();
        config.storage = StorageConfig::rooted_at(dir.path());
        config.daemon.binary = PathBuf::from("/bin/sh");
        config.daemon.args = vec!["-c".into(), "exec sleep 30".into(), "daemon".into()];
        (dir, Manager::from_config(&config))
    }

    #[tokio::test]
    async fn test_prepare_then_create_restarts_daemon() {
        let (_dir, manager) = manager();
        manager.prepare().await.unwrap();
        manager.start_daemon().await;
        let before = manager.supervisor().pid().await.unwrap();

        let created = manager.create_client("alice").await.unwrap();
        let after = manager.supervisor().pid().await.unwrap();

        assert_ne!(before, after);
        assert!(manager.store().active_client_ids().unwrap().contains(&created.descriptor.id.to_string()));
        // default + alice
        assert_eq!(manager.list_clients().await.len(), 2);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_create_skips_restart() {
        let (_dir, manager) = manager();
        manager.prepare().await.unwrap();
        manager.create_client("alice").await.unwrap();
        let pid = manager.supervisor().pid().await;

        assert!(matches!(
            manager.create_client("alice").await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(manager.supervisor().pid().await, pid);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_port_change_moves_listener() {
        let (_dir, manager) = manager();
        manager.prepare().await.unwrap();

        let patch = SettingsPatch {
            vmess_port: Some(2053),
            ..Default::default()
        };
        let settings = manager.update_settings(&patch).await.unwrap();

        assert_eq!(settings.vmess_port, 2053);
        let active: crate::store::ActiveConfig =
            crate::store::files::read_json(manager.store().running_file()).unwrap().unwrap();
        assert_eq!(active.listener_port(), Some(2053));
        assert!(manager.health().await.daemon_running);
        manager.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_creates_all_land() {
        let (_dir, manager) = manager();
        manager.prepare().await.unwrap();
        manager.store().clear(51820).unwrap();
        let manager = Arc::new(manager);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.create_client(&format!("user{i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(manager.store().active_client_ids().unwrap().len(), 8);
        assert_eq!(manager.list_clients().await.len(), 8);
        assert!(manager.supervisor().is_running().await);
        manager.shutdown().await;
    }
}
