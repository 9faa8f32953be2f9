use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

use chat_memory_server::config::Settings;
use chat_memory_server::handlers;
use chat_memory_server::logging::init_telemetry;
use chat_memory_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    // keep the guard alive so the file writer flushes on exit
    let _log_guard = init_telemetry(&settings.logging);

    info!("🚀 Starting chat memory server...");

    let state = AppState::init(settings.clone())?;
    info!("✅ Services initialized");

    let app = build_router(state.clone());

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("👋 Server stopped");

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    // auth happens per request (bearer) or on the first socket frame
    let protected_routes = Router::new()
        .route("/ws/chat", get(handlers::chat::chat_ws_handler))
        .route(
            "/api/generate-description",
            post(handlers::language::generate_description_handler),
        )
        .route(
            "/api/generate-refined-prompt",
            post(handlers::language::refine_prompt_handler),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(
            CorsLayer::permissive()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
