use std::sync::Arc;
use tracing::info;

use crate::models::chat::ChatMessage;
use crate::utils::limiters::Limiters;

use super::generator::{BackendError, TextGenerator};

const DESCRIPTION_INSTRUCTIONS: &str = "You are an advanced AI description generator for an online store that sells \
texas and western themed products. Create engaging and detailed descriptions from the provided user prompt. \
Your descriptions must always be 100 characters or less.";

const REFINE_INSTRUCTIONS: &str = "You are an advanced AI prompt engineer generating prompts for an advanced image \
generator. Use words to describe color, texture, lighting, depth of field, blur, definition (photorealistic, \
cartoon, 3d, 8k), and more. Surrounding words with parenthesis like (blur) will increase their impact on the \
image. You can further increase or decrease the weight by adding (((blur))) pairs, or explicitly specify a weight \
value like (blur:1.2). Only return the prompt in the form of a refined version of their sentence followed by a \
comma separated list of attributes, do not say here is your prompt or anything like that. Create engaging and \
detailed prompts from the provided user prompt. Your prompts must always be 77 words or less.";

/// One-shot generation tasks that don't touch conversation memory.
#[derive(Clone)]
pub struct LanguageService {
    generator: Arc<dyn TextGenerator>,
    limiters: Limiters,
}

impl LanguageService {
    pub fn new(generator: Arc<dyn TextGenerator>, limiters: Limiters) -> Self {
        Self { generator, limiters }
    }

    pub async fn generate_description(&self, user_prompt: &str) -> Result<String, BackendError> {
        let description = self.run(DESCRIPTION_INSTRUCTIONS, user_prompt).await?;
        info!("Generated description ({} chars)", description.chars().count());
        Ok(description)
    }

    pub async fn refine_prompt(&self, user_prompt: &str) -> Result<String, BackendError> {
        let refined = self.run(REFINE_INSTRUCTIONS, user_prompt).await?;
        info!("Refined prompt ({} chars)", refined.chars().count());
        Ok(refined)
    }

    async fn run(&self, instructions: &str, user_prompt: &str) -> Result<String, BackendError> {
        let messages = build_prompt(instructions, user_prompt);
        let _permit = self.limiters.acquire_llm().await?;
        self.generator.generate(&messages).await
    }
}

fn build_prompt(instructions: &str, user_prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(instructions),
        ChatMessage::user(format!("prompt: {}", user_prompt)),
    ]
}
