//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → Settings (immutable for the process lifetime)
//!
//! rule document (JSON)
//!     → loader.rs (parse) → validation.rs (semantic checks)
//!     → AccessSystem → rules::EngineSnapshot (expressions compiled)
//!     → atomic publish via the coordinator
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs + validation.rs
//!     → new snapshot built off to the side, swapped in whole
//!     → a document that fails anywhere leaves the old snapshot live
//! ```

pub mod document;
pub mod loader;
pub mod settings;
pub mod validation;
pub mod watcher;

pub use document::{AccessSystem, Rule, TokenEntry, ROOT_TOKEN_NAME};
pub use loader::{build_resolver, load_document, load_settings, ConfigError};
pub use settings::{KeyMode, Settings};
pub use validation::{validate_document, ValidationError};
pub use watcher::DocumentWatcher;
