use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use super::support::{identity, GOOD_TOKEN, USER};
use crate::auth::{BearerIdentity, IdentityResolver};
use crate::handlers::health::health_check;

async fn whoami(BearerIdentity(caller): BearerIdentity) -> String {
    caller.to_string()
}

fn app() -> Router {
    let resolver: Arc<dyn IdentityResolver> = Arc::new(identity());
    Router::new()
        .route("/health", get(health_check))
        .route("/whoami", get(whoami))
        .with_state(resolver)
}

fn request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let response = app().oneshot(request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_resolves_caller() {
    let response = app().oneshot(request("/whoami", Some(GOOD_TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], USER.as_bytes());
}

#[tokio::test]
async fn test_missing_or_bad_bearer_is_unauthorized() {
    let response = app().oneshot(request("/whoami", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app().oneshot(request("/whoami", Some("forged"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
