use tracing::debug;

use crate::models::chat::{AuthMessage, ConversationId};

use super::jwt::JwtManager;
use super::AuthError;

/// Maps a validated credential to the conversation it owns.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<ConversationId, AuthError>;
}

pub struct JwtIdentityResolver {
    jwt: JwtManager,
}

impl JwtIdentityResolver {
    pub fn new(jwt: JwtManager) -> Self {
        Self { jwt }
    }
}

#[async_trait::async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<ConversationId, AuthError> {
        let claims = self.jwt.validate_token(token)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        debug!("Resolved identity {}", claims.sub);
        Ok(ConversationId::new(claims.sub))
    }
}

/// Pull the token out of a socket auth frame, `{"token": "..."}`.
pub fn parse_auth_frame(frame: &str) -> Result<String, AuthError> {
    let message: AuthMessage =
        serde_json::from_str(frame).map_err(|e| AuthError::Malformed(e.to_string()))?;

    let token = message.token.trim();
    if token.is_empty() {
        return Err(AuthError::Malformed("token is empty".to_string()));
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subject_becomes_conversation_id() {
        let jwt = JwtManager::new("secret", 60);
        let token = jwt.generate_token("alice").unwrap();
        let resolver = JwtIdentityResolver::new(jwt);

        let id = resolver.resolve(&token).await.unwrap();
        assert_eq!(id.history_key(), "alice:messages");
    }

    #[test]
    fn test_parse_auth_frame() {
        assert_eq!(parse_auth_frame(r#"{"token":" abc "}"#).unwrap(), "abc");
        assert!(matches!(parse_auth_frame("hello"), Err(AuthError::Malformed(_))));
        assert!(matches!(parse_auth_frame(r#"{"token":""}"#), Err(AuthError::Malformed(_))));
    }
}
