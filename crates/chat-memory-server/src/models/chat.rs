use serde::{Deserialize, Serialize};
use std::fmt;

// ===== IDENTITY =====

/// Opaque per-user conversation identifier (the authenticated subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key holding this conversation's turns.
    pub fn history_key(&self) -> String {
        format!("{}:messages", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ===== MODEL MESSAGES =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// ===== SOCKET FRAMES =====

/// First frame a client sends on the chat socket.
#[derive(Debug, Deserialize)]
pub struct AuthMessage {
    pub token: String,
}

// ===== HTTP MODELS =====

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    #[serde(rename = "userPrompt")]
    pub user_prompt: String,
}

#[derive(Debug, Serialize)]
pub struct DescriptionResponse {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct RefinedPromptResponse {
    #[serde(rename = "refinedPrompt")]
    pub refined_prompt: String,
}
