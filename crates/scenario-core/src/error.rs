//! Error types for scenario-core

use crate::identity::StepId;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    #[error("Step {id} is not a {expected} step")]
    WrongStepKind { id: StepId, expected: &'static str },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

impl Error {
    /// Build a type error from two kind names
    pub fn type_error(expected: impl ToString, got: impl ToString) -> Self {
        Error::TypeError {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
