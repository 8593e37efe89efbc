//! gn-tour - Landmark Tour Narration Service
//!
//! Accepts a landmark photo and drives the identify → research → narrate
//! pipeline against the Gemini API, streaming progress over SSE and serving
//! the accumulated results to the presentation layer.

use anyhow::Result;
use gn_common::config::TomlConfig;
use gn_common::events::EventBus;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gn_tour::services::{GeminiClient, PipelineController};
use gn_tour::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting gn-tour (Landmark Tour Narration) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let toml_config = TomlConfig::load()?;
    let api_key = gn_tour::config::resolve_gemini_api_key(&toml_config)?;

    let capability = Arc::new(
        GeminiClient::new(api_key).map_err(|e| anyhow::anyhow!("Gemini client init failed: {}", e))?,
    );

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let controller = PipelineController::new(capability, event_bus.clone());
    let state = AppState::new(controller, event_bus);

    let app = gn_tour::build_router(state);

    let bind_address = gn_common::config::resolve_bind_address(&toml_config);
    let port = gn_common::config::resolve_port(&toml_config)?;
    let listener = tokio::net::TcpListener::bind((bind_address.as_str(), port)).await?;
    info!("Listening on http://{}:{}", bind_address, port);
    info!("Health check: http://{}:{}/health", bind_address, port);

    axum::serve(listener, app).await?;

    Ok(())
}
