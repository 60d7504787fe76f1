//! Model-facing session data.
//!
//! - [`entities::Conversation`]: message history fed to the model
//! - [`entities::ModelInfo`]: capabilities used to size output budgets
//! - [`stream::ModelChunk`]: one chunk of a streaming response

pub mod entities;
pub mod stream;

pub use entities::{Conversation, Message, ModelInfo};
pub use stream::{ModelChunk, TokenUsage};
