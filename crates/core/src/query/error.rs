use thiserror::Error;

/// Errors raised while parsing caller-supplied query values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Selector must be an object, a string or null, got: {0}")]
    InvalidSelector(String),
    #[error("Unknown query operator: {0}")]
    UnknownOperator(String),
    #[error("Invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },
    #[error("Invalid projection for field {0}: expected 0, 1 or a boolean")]
    InvalidProjection(String),
    #[error("Invalid sort order for field {0}: expected 1, -1, \"asc\" or \"desc\"")]
    InvalidSort(String),
    #[error("Unknown find option: {0}")]
    UnknownOption(String),
    #[error("Invalid value for option {option}: {reason}")]
    InvalidOption { option: String, reason: String },
}

/// Result type for query parsing.
pub type Result<T> = std::result::Result<T, QueryError>;
