//! Rule binding and decision coordination.
//!
//! # Data Flow
//! ```text
//! AccessSystem document (config load / reload)
//!     → binder.rs (compile expressions, register bound handlers)
//!     → snapshot.rs (router + overrides, built off to the side)
//!     → coordinator.rs (ArcSwap publish; per-request decide())
//! ```

pub mod binder;
pub mod coordinator;
pub mod snapshot;

pub use coordinator::DecisionCoordinator;
pub use snapshot::EngineSnapshot;
