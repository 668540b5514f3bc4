//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports non-zero, grace period > 0)
//! - Keep the subscription path from shadowing the API
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ManagerConfig;
use crate::config::settings::is_valid_subscription_path;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be a non-zero port")]
    ZeroPort { field: &'static str },

    #[error("subscription path {0:?} must start with '/' and live outside /api")]
    SubscriptionPath(String),

    #[error("daemon.stop_grace_secs must be greater than zero")]
    ZeroGrace,

    #[error("daemon.binary must not be empty")]
    EmptyBinary,
}

/// Check a loaded configuration.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.vmess.port == 0 {
        errors.push(ValidationError::ZeroPort { field: "vmess.port" });
    }
    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort { field: "server.port" });
    }
    if !is_valid_subscription_path(&config.subscription.path) {
        errors.push(ValidationError::SubscriptionPath(config.subscription.path.clone()));
    }
    if config.daemon.stop_grace_secs == 0 {
        errors.push(ValidationError::ZeroGrace);
    }
    if config.daemon.binary.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyBinary);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
