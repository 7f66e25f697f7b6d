use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    EmptyTitle,
    CompletionMismatch,
    EmptyUserName,
}

/// Raised when a reminder would be constructed or decoded in a state that
/// breaks the model's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn empty_title() -> Self {
        Self::new(ErrorCode::EmptyTitle, "reminder title must not be empty")
    }

    pub fn empty_user_name() -> Self {
        Self::new(ErrorCode::EmptyUserName, "user name must not be empty")
    }
}
