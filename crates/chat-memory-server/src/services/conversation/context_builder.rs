use tracing::debug;

use crate::models::chat::{ChatMessage, ConversationId};

use super::memory::{ConversationMemory, MemoryError};
use super::token_counter::TokenCounter;
use super::types::HistoryWindow;

/// Builds the `[system, user]` pair sent to the text backend for one turn.
#[derive(Clone)]
pub struct PromptAssembler {
    memory: ConversationMemory,
    instructions: String,
    window: HistoryWindow,
}

impl PromptAssembler {
    pub fn new(memory: ConversationMemory, instructions: String, window: HistoryWindow) -> Self {
        Self {
            memory,
            instructions,
            window,
        }
    }

    pub fn default_instructions() -> String {
        "You are an advanced AI chatbot. You give helpful, respectful, and informational answers. Chat Memory:"
            .to_string()
    }

    pub async fn assemble(
        &self,
        conversation: &ConversationId,
        user_text: &str,
    ) -> Result<Vec<ChatMessage>, MemoryError> {
        let history = self.memory.get_memory(conversation).await?;
        let total = history.len();
        let kept = self.window.apply(&history);

        if kept.len() < total {
            debug!(
                "History for {} bounded to {} of {} turn(s)",
                conversation,
                kept.len(),
                total
            );
        }

        Ok(Self::build_messages(&self.instructions, kept, user_text))
    }

    pub fn build_messages(instructions: &str, history: &[String], user_text: &str) -> Vec<ChatMessage> {
        let system = format!("{}\n{}", instructions, history.join("\n"));
        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("prompt: {}", user_text)),
        ]
    }
}

impl HistoryWindow {
    /// Most recent turns that fit both bounds, still in conversational order.
    pub fn apply<'a>(&self, history: &'a [String]) -> &'a [String] {
        let mut start = match self.max_turns {
            Some(max) if history.len() > max => history.len() - max,
            _ => 0,
        };

        if let Some(budget) = self.max_tokens {
            let mut used = TokenCounter::count_turns(&history[start..]);
            while used > budget && start < history.len() {
                used -= TokenCounter::count_text(&history[start]);
                start += 1;
            }
        }

        &history[start..]
    }
}
