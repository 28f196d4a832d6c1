//! Forward-authorization decision engine for reverse proxies.
//!
//! Given an inbound request's host, method, path and headers, produce an
//! allow/deny decision plus a resolved username. The pieces:
//!
//! - `expr`: the rule expression language, compiled once per rule
//! - `routing`: host → prefix → method/pattern dispatch with captures
//! - `identity`: JWT validation and permission grants
//! - `rules`: binds documents to the router, coordinates decisions
//! - `config`: settings, the rule document, loading and hot reload
//! - `http`: the forward-auth endpoint the gateway calls

pub mod config;
pub mod expr;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod rules;

pub use config::{AccessSystem, Settings};
pub use http::AuthServer;
pub use routing::{Decision, PatternRouter};
pub use rules::{DecisionCoordinator, EngineSnapshot};
