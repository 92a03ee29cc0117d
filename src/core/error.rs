use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Expression text that does not conform to the JSONQL grammar.
///
/// Cloneable so the negative cache can hand the same failure to every
/// caller that submits the same malformed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    /// Character offset into the expression text.
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for SyntaxError {}

#[derive(Error, Debug, Clone)]
pub enum JsonQlError {
    #[error("Syntax error {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Parser pool exhausted: no parser became available within {0:?}")]
    ResourceExhausted(Duration),

    #[error("Parser failure: {0}")]
    ParserFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl JsonQlError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}

pub type Result<T> = std::result::Result<T, JsonQlError>;

impl<T> From<std::sync::PoisonError<T>> for JsonQlError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
