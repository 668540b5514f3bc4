//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → subscription.rs (path == SUBSCRIPTION_URL → list.txt)
//!     → handlers.rs (/api/* → Manager)
//!     → frontend bundle (everything else, index.html fallback)
//! ```

pub mod error;
pub mod handlers;
pub mod server;
pub mod subscription;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
