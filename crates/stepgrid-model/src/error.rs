use std::io;

use thiserror::Error;

use crate::pattern::PatternId;

/// Errors raised while loading, saving or editing sequencer state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error while accessing state: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse state document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid state document: {0}")]
    Invalid(String),
    #[error("pattern {0} not found")]
    UnknownPattern(PatternId),
}

impl StateError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        StateError::Invalid(reason.into())
    }
}
