//! Proxy daemon supervision.
//!
//! # Data Flow
//! ```text
//! Manager mutation finished (running.json on disk)
//!     → Supervisor::restart()
//!         → stop: SIGTERM → wait grace → SIGKILL
//!         → start: spawn <binary> run -config running.json
//!             → output.rs forwards stdout/stderr lines to tracing
//! ```
//!
//! # Design Decisions
//! - Exactly one child; the handle never leaves the supervisor
//! - No differential reload: every change pays a full stop + start
//! - Launch failures are returned and logged, never retried

pub mod output;
pub mod supervisor;

pub use supervisor::{DaemonCommand, StartOutcome, StopOutcome, Supervisor, SupervisorError};
