//! Config store subsystem.
//!
//! # Data Flow
//! ```text
//! create(name)
//!     → configs/<name>.json   (single-client fragment)
//!     → list.txt              (append vmess:// token)
//!     → running.json          (add id to first inbound)
//!
//! delete(name)
//!     → configs/<name>.json   (recover id, remove)
//!     → list.txt              (drop lines decoding to <name>)
//!     → running.json          (drop recovered id)
//! ```
//!
//! # Design Decisions
//! - running.json is patched, never re-derived from fragments
//! - Missing files and unparseable fragments mean "nothing to do"
//! - Duplicate names are the only hard precondition failure

pub mod active;
pub mod error;
pub mod files;
pub mod repository;

pub use active::ActiveConfig;
pub use error::StoreError;
pub use repository::{ClearOutcome, ConfigStore, CreatedClient, DeleteOutcome, StorePaths};
