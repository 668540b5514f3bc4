//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → optional TOML file (loader.rs)
//!     → environment overrides (IP, VMESS_PORT, HOST_PORT, ...)
//!     → settings.json overlay (settings.rs)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (immutable, threaded to every subsystem)
//!
//! On POST /api/settings:
//!     SettingsPatch (lenient coercion)
//!     → SettingsStore persists settings.json
//!     → atomic swap of Arc<Settings>
//! ```
//!
//! # Design Decisions
//! - Only the four runtime settings are mutable; everything else needs a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DaemonConfig, LogFormat, ManagerConfig, ObservabilityConfig, ServerConfig, StorageConfig,
    SubscriptionConfig, VmessConfig,
};
pub use settings::{Settings, SettingsPatch, SettingsStore};
