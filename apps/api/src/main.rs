mod config;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod profiling;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::profiling::pipeline::Pipeline;
use crate::profiling::session::SessionRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Talentscope API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        &config.llm_base_url,
        config.llm_timeout,
    );
    info!(
        "LLM client initialized (text model: {}, vision model: {}, endpoint: {}, timeout: {:?})",
        llm_client::TEXT_MODEL,
        llm_client::VISION_MODEL,
        llm.endpoint(),
        config.llm_timeout
    );

    let sessions = SessionRegistry::new(config.session_limits());
    sessions.spawn_sweeper();
    info!(
        "Session registry ready (idle ttl: {:?}, max sessions: {})",
        config.session_idle_ttl, config.max_sessions
    );

    let state = AppState {
        config: config.clone(),
        pipeline: Pipeline::new(Arc::new(llm)),
        sessions,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the presentation layer is deployed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!(
        "Listening on {addr} (max upload: {} bytes)",
        config.max_upload_bytes
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
