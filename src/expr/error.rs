//! Error types for rule expression compilation and evaluation.

use thiserror::Error;

/// Raised while compiling an expression string. A rule that fails to
/// compile blocks activation of the configuration snapshot that carries it.
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("argument separator outside a function call")]
    StraySeparator,

    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),

    #[error("expected `{expected}`, found `{found}`")]
    Expected { expected: String, found: String },

    #[error("expression ends mid-operation")]
    UnexpectedEnd,

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

/// Raised while evaluating a compiled rule against a request. Evaluation
/// errors are contained by the caller and folded into a denial; they are
/// never surfaced to the requester.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("operator `{op}` cannot take a {got} operand")]
    TypeMismatch { op: &'static str, got: &'static str },

    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("no function `{0}` in the registry")]
    UnknownFunction(String),

    #[error("`{func}` takes {expected} argument(s), got {got}")]
    Arity {
        func: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("`{func}`: {msg}")]
    Function { func: &'static str, msg: String },

    #[error("invalid regex `{pattern}`: {msg}")]
    Regex { pattern: String, msg: String },

    #[error("rule evaluated to {0}, expected a boolean")]
    NonBooleanResult(&'static str),
}
