use futures::stream::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::models::chat::ChatMessage;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to call text backend: {0}")]
    Request(String),

    #[error("text backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("text backend busy: {0}")]
    Busy(String),
}

/// Finite, non-restartable sequence of output fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// Text-generation backend shared by every session.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the whole completion at once.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;

    /// Generate with streaming.
    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, BackendError>;

    /// Whether concurrent calls are allowed; otherwise callers serialize.
    fn supports_concurrent_inference(&self) -> bool;
}
