//! Token counting capability used by the output budgeter.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenCountError {
    #[error("Tokenizer unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to count tokens: {0}")]
    Failed(String),
}

/// Counts model tokens in a piece of text.
///
/// Implementations that hold expensive resources (a loaded tokenizer,
/// a subprocess) release them in `Drop`, so dropping the counter is the
/// deterministic close.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, TokenCountError>;
}

/// 4 bytes per token, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> Result<usize, TokenCountError> {
        Ok(text.len().div_ceil(4))
    }
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> Result<usize, TokenCountError> + Send + Sync,
{
    fn count(&self, text: &str) -> Result<usize, TokenCountError> {
        self(text)
    }
}
