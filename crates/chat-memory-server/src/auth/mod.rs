pub mod identity;
pub mod jwt;
pub mod middleware;

use thiserror::Error;

pub use identity::{parse_auth_frame, IdentityResolver, JwtIdentityResolver};
pub use jwt::JwtManager;
pub use middleware::BearerIdentity;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("malformed auth frame: {0}")]
    Malformed(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),
}
