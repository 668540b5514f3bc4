//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use vmess_manager::config::StorageConfig;
use vmess_manager::{HttpServer, Manager, ManagerConfig, Shutdown};

pub const INDEX_HTML: &str = "<!doctype html><title>vmess</title>";

/// A manager config rooted in a fresh temp dir, with `sh` standing in
/// for the daemon.
pub fn test_config() -> (TempDir, ManagerConfig) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ManagerConfig::default();
    config.storage = StorageConfig::rooted_at(dir.path());
    config.daemon.binary = PathBuf::from("/bin/sh");
    config.daemon.args = vec!["-c".into(), "exec sleep 30".into(), "daemon".into()];
    config.daemon.stop_grace_secs = 1;

    let dist = config.storage.frontend_dist();
    std::fs::create_dir_all(&dist).unwrap();
    std::fs::write(dist.join("index.html"), INDEX_HTML).unwrap();

    (dir, config)
}

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub manager: Arc<Manager>,
    pub config: ManagerConfig,
    shutdown: Shutdown,
    task: JoinHandle<std::io::Result<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.task.await;
        self.manager.shutdown().await;
    }
}

/// Prepare the store, start the daemon, and serve the API.
pub async fn spawn_server() -> TestServer {
    let (dir, config) = test_config();

    let manager = Arc::new(Manager::from_config(&config));
    manager.prepare().await.unwrap();
    manager.start_daemon().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, manager.clone());
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        manager,
        config,
        shutdown,
        task,
        _dir: dir,
    }
}
