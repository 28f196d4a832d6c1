//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! (host, method, raw path, headers)
//!     → router.rs (host table, longest-prefix muxer selection)
//!     → pattern.rs (ordered structural match, capture extraction)
//!     → bound rule handler → Decision
//! ```
//!
//! # Design Decisions
//! - Tables are built once per configuration load and never mutated;
//!   reloads publish a whole new router
//! - Deterministic: overlapping prefixes resolve by length, patterns by
//!   registration order
//! - No regex in the hot path; patterns are compiled literal/capture runs

pub mod pattern;
pub mod router;

pub use pattern::{Captures, Pattern};
pub use router::{Action, Decision, PatternRouter, RouteHandler, RouteRequest};
