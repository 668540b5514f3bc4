//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, daemon output lines)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (container logs)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (name, id, pid) on every store and daemon event
//! - Request ID flows through the HTTP trace spans

pub mod logging;
pub mod metrics;
