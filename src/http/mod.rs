//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! gateway auth_request
//!     → server.rs (read X-Forwarded-* headers)
//!     → rules::DecisionCoordinator::decide
//!     → 200/401/403/404/405 + X-Auth-User
//! ```

pub mod server;

pub use server::{AppState, AuthServer};
