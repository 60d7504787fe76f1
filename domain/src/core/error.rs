//! Domain error types

use crate::budget::TokenCountError;
use crate::security::AccessError;
use crate::tool::SchemaError;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    TokenCount(#[from] TokenCountError),

    #[error("No such tool: {0}")]
    NoSuchTool(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
