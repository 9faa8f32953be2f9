use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // conversation owner
    pub exp: usize,
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_seconds: u64,
}

impl JwtManager {
    pub fn new(secret: &str, expiration_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_seconds,
        }
    }

    pub fn generate_token(&self, subject: &str) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .as_secs() as usize;

        let claims = Claims {
            sub: subject.to_string(),
            exp: now + self.expiration_seconds as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_keeps_subject() {
        let jwt = JwtManager::new("secret", 60);
        let token = jwt.generate_token("user-42").unwrap();
        assert_eq!(jwt.validate_token(&token).unwrap().sub, "user-42");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("secret", 60).generate_token("user-42").unwrap();
        let err = JwtManager::new("other", 60).validate_token(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_garbage_rejected() {
        let jwt = JwtManager::new("secret", 60);
        assert!(jwt.validate_token("not-a-jwt").is_err());
    }
}
