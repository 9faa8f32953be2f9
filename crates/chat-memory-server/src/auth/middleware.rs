use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use std::sync::Arc;

use crate::models::chat::ConversationId;
use crate::utils::error::ApiError;

use super::IdentityResolver;

/// Caller identity taken from `Authorization: Bearer <jwt>`.
pub struct BearerIdentity(pub ConversationId);

impl<S> FromRequestParts<S> for BearerIdentity
where
    Arc<dyn IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Token missing".to_string()))?;

        let resolver = Arc::<dyn IdentityResolver>::from_ref(state);
        let id = resolver
            .resolve(token)
            .await
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        Ok(BearerIdentity(id))
    }
}
