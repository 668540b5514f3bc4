//! Client descriptor codec.
//!
//! # Data Flow
//! ```text
//! ClientDescriptor
//!     → serde_json (share-link field names)
//!     → base64 (standard alphabet, padded)
//!     → "vmess://..." token, one per line in list.txt
//!
//! token
//!     → strip "vmess://" → base64 (padding optional) → JSON
//!     → DecodedLink { fields, raw }
//! ```
//!
//! # Design Decisions
//! - Decoding never fails; unreadable tokens degrade to raw-only records
//! - Decoded payloads stay untyped so tokens from other generators keep
//!   every field
//! - Unknown JSON keys survive a round trip

pub mod descriptor;
pub mod link;

pub use descriptor::ClientDescriptor;
pub use link::{decode, encode, DecodedLink, VMESS_PREFIX};
