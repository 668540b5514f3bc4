//! VMess manager library.
//!
//! Manages client identities for a supervised V2Ray daemon: per-client
//! config fragments, the `list.txt` subscription file, the active
//! `running.json`, and restarts of the daemon whenever they change.

pub mod codec;
pub mod config;
pub mod daemon;
pub mod http;
pub mod lifecycle;
pub mod manager;
pub mod observability;
pub mod store;

pub use config::ManagerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use manager::Manager;
