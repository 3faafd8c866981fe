use thiserror::Error;

/// A formula that failed to parse. Fatal at descriptor-commit time (spec
/// §7: "Parse errors in a committed formula are fatal at validation time
/// and reject the descriptor edit").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("formula parse error at position {position}: {reason}")]
pub struct ParseError {
    pub position: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(position: usize, reason: impl Into<String>) -> Self {
        Self { position, reason: reason.into() }
    }
}

/// An evaluation-time failure: a predicate's coercion failed, a regex
/// wouldn't compile, or a formula hit division-by-zero/overflow. Confined
/// to the one field being evaluated this tick (spec §7).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("cannot coerce literal to the upstream field's type")]
    LiteralCoercion,

    #[error("field reference %({0}) is out of range (only {1} source(s) configured)")]
    FieldRefOutOfRange(usize, usize),

    #[error("invalid regex pattern: {0}")]
    InvalidRegex(String),

    #[error("comparison requires a string value for a regex match")]
    RegexRequiresString,

    #[error("division by zero")]
    DivideByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("result cannot be represented as the declared field type")]
    ResultCoercion,

    #[error("an upstream source is in error")]
    UpstreamError,
}
