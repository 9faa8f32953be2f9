//! Conversation memory and the per-connection chat session.
//!
//! - `store`: raw list storage (Redis or in-process)
//! - `memory`: per-conversation view with shape recovery
//! - `context_builder`: prompt assembly with a bounded history window
//! - `session`: the streaming state machine

mod cache;
mod context_builder;
mod memory;
mod redis_store;
pub mod session;
mod store;
mod token_counter;
pub mod types;

pub use cache::InMemoryHistoryStore;
pub use context_builder::PromptAssembler;
pub use memory::{ConversationMemory, MemoryError};
pub use redis_store::RedisHistoryStore;
pub use session::{ChatEngine, GenerationSession, SessionError};
pub use store::{HistoryStore, StoreError};
pub use token_counter::TokenCounter;
pub use types::{GenerationResult, HistoryWindow, SessionPolicy, SessionState};

#[cfg(test)]
pub use store::MockHistoryStore;
