//! Error types for scenario-script

use std::path::PathBuf;
use thiserror::Error;

/// Script loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Scenario list includes itself: {0}")]
    IncludeCycle(PathBuf),

    #[error(transparent)]
    Core(#[from] scenario_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
