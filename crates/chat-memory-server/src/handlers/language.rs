use axum::{extract::State, Json};
use tracing::info;

use crate::auth::BearerIdentity;
use crate::models::chat::{DescriptionResponse, LanguageRequest, RefinedPromptResponse};
use crate::services::LanguageService;
use crate::utils::error::ApiError;

pub async fn generate_description_handler(
    BearerIdentity(caller): BearerIdentity,
    State(language): State<LanguageService>,
    Json(request): Json<LanguageRequest>,
) -> Result<Json<DescriptionResponse>, ApiError> {
    let prompt = validated_prompt(&request)?;
    info!("Description request from {} ({} chars)", caller, prompt.chars().count());

    let description = language
        .generate_description(prompt)
        .await
        .map_err(|e| ApiError::llm("Error generating description", &e))?;

    Ok(Json(DescriptionResponse { description }))
}

pub async fn refine_prompt_handler(
    BearerIdentity(caller): BearerIdentity,
    State(language): State<LanguageService>,
    Json(request): Json<LanguageRequest>,
) -> Result<Json<RefinedPromptResponse>, ApiError> {
    let prompt = validated_prompt(&request)?;
    info!("Refine request from {} ({} chars)", caller, prompt.chars().count());

    let refined_prompt = language
        .refine_prompt(prompt)
        .await
        .map_err(|e| ApiError::llm("Error refining prompt", &e))?;

    Ok(Json(RefinedPromptResponse { refined_prompt }))
}

fn validated_prompt(request: &LanguageRequest) -> Result<&str, ApiError> {
    let prompt = request.user_prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("userPrompt is empty".to_string()));
    }
    Ok(prompt)
}
