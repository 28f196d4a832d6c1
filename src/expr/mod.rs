//! Rule expression engine.
//!
//! # Data Flow
//! ```text
//! expression string
//!     → token.rs (lex into typed tokens)
//!     → parser.rs (balance/adjacency checks, precedence climbing)
//!     → CompiledRule (immutable evaluation tree, built once per rule)
//!
//! Per request:
//!     CompiledRule::evaluate(&Registry, &RequestFacts) → bool
//! ```
//!
//! Compilation failures block configuration activation; evaluation
//! failures are typed, contained by the caller and folded into a denial.

pub mod builtins;
pub mod error;
pub mod eval;
pub mod parser;
pub mod token;
pub mod value;

pub use builtins::{Predicate, Registry, RegistryBuilder, RequestFacts};
pub use error::{EvalError, SyntaxError};
pub use parser::{compile, CompiledRule};
pub use value::Value;
