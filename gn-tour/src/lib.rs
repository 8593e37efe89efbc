//! gn-tour library interface
//!
//! Exposes the pipeline controller, audio decoding, capability contract,
//! and HTTP shell for the binary and for integration testing.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use gn_common::events::EventBus;
use std::sync::Arc;

use crate::services::PipelineController;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The single live pipeline controller
    pub controller: Arc<PipelineController>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(controller: Arc<PipelineController>, event_bus: EventBus) -> Self {
        Self {
            controller,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// CORS is permissive: the presentation layer is served from a different
/// origin during development.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::cors::CorsLayer;

    Router::new()
        .merge(api::tour_routes())
        .route("/tour/events", get(api::tour_event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
