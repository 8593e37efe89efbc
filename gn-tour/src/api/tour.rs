//! Tour pipeline API handlers
//!
//! POST /tour/start, GET /tour/status, GET /tour/result, GET /tour/audio,
//! POST /tour/reset

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use gn_common::events::PipelineState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{GroundingSource, LandmarkInfo};
use crate::services::{ImagePayload, PipelineError};
use crate::AppState;

pub fn tour_routes() -> Router<AppState> {
    Router::new()
        .route("/tour/start", post(start_tour))
        .route("/tour/status", get(get_tour_status))
        .route("/tour/result", get(get_tour_result))
        .route("/tour/audio", get(get_tour_audio))
        .route("/tour/reset", post(reset_tour))
}

/// POST /tour/start request
#[derive(Debug, Deserialize)]
pub struct StartTourRequest {
    /// Base64-encoded image bytes
    pub image_base64: String,
    /// MIME type, passed through to the capability unvalidated
    pub mime_type: String,
}

/// POST /tour/start response
#[derive(Debug, Serialize)]
pub struct StartTourResponse {
    pub run_id: Uuid,
    pub state: PipelineState,
}

/// GET /tour/status response
#[derive(Debug, Serialize)]
pub struct TourStatusResponse {
    pub state: PipelineState,
    pub run_id: Option<Uuid>,
    pub progress: String,
    pub elapsed_seconds: u64,
    pub error_message: Option<String>,
}

/// Narration descriptor in the result response; samples are served
/// separately by GET /tour/audio
#[derive(Debug, Serialize)]
pub struct NarrationDescriptor {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_count: usize,
    pub duration_seconds: f64,
}

/// GET /tour/result response
#[derive(Debug, Serialize)]
pub struct TourResultResponse {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub landmark: Option<LandmarkInfo>,
    pub history: Option<String>,
    pub sources: Vec<GroundingSource>,
    pub narration: Option<NarrationDescriptor>,
    pub narration_error: Option<String>,
    pub error_message: Option<String>,
}

/// POST /tour/reset response
#[derive(Debug, Serialize)]
pub struct ResetTourResponse {
    pub state: PipelineState,
}

/// POST /tour/start
///
/// Begin a pipeline run. Returns 202 Accepted with the run id, or 409
/// Conflict while a run exists; the caller must reset first.
pub async fn start_tour(
    State(state): State<AppState>,
    Json(request): Json<StartTourRequest>,
) -> ApiResult<(StatusCode, Json<StartTourResponse>)> {
    let data = general_purpose::STANDARD
        .decode(&request.image_base64)
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image payload: {}", e)))?;

    if data.is_empty() {
        return Err(ApiError::BadRequest("Empty image payload".to_string()));
    }

    let image = ImagePayload {
        data,
        mime_type: request.mime_type,
    };

    let run_id = state.controller.start(image).map_err(|e| match e {
        PipelineError::InvalidState(current) => {
            ApiError::Conflict(format!("Pipeline already has a run (state: {:?})", current))
        }
    })?;

    tracing::info!(run_id = %run_id, "Tour run accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartTourResponse {
            run_id,
            state: PipelineState::Identifying,
        }),
    ))
}

/// GET /tour/status
///
/// Poll pipeline progress.
pub async fn get_tour_status(State(state): State<AppState>) -> Json<TourStatusResponse> {
    let response = match state.controller.snapshot() {
        Some(session) => TourStatusResponse {
            state: session.state,
            run_id: Some(session.run_id),
            progress: session.progress_message.clone(),
            elapsed_seconds: session.elapsed_seconds(),
            error_message: session.error_message,
        },
        None => TourStatusResponse {
            state: PipelineState::Idle,
            run_id: None,
            progress: "Ready".to_string(),
            elapsed_seconds: 0,
            error_message: None,
        },
    };

    Json(response)
}

/// GET /tour/result
///
/// Terminal pipeline result. 409 until the run reaches Succeeded or Failed.
pub async fn get_tour_result(
    State(state): State<AppState>,
) -> ApiResult<Json<TourResultResponse>> {
    let session = state
        .controller
        .snapshot()
        .ok_or_else(|| ApiError::NotFound("No tour run exists".to_string()))?;

    if !session.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Run still in progress (state: {:?})",
            session.state
        )));
    }

    let narration = session.narration.as_ref().map(|audio| NarrationDescriptor {
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        frame_count: audio.frame_count(),
        duration_seconds: audio.duration_seconds(),
    });

    Ok(Json(TourResultResponse {
        run_id: session.run_id,
        state: session.state,
        landmark: session.landmark,
        history: session.history.as_ref().map(|h| h.text.clone()),
        sources: session
            .history
            .map(|h| h.sources)
            .unwrap_or_default(),
        narration,
        narration_error: session.narration_error,
        error_message: session.error_message,
    }))
}

/// GET /tour/audio
///
/// Decoded narration samples as raw little-endian f32 bytes. Sample rate
/// and channel count travel in response headers.
pub async fn get_tour_audio(State(state): State<AppState>) -> ApiResult<Response> {
    let session = state
        .controller
        .snapshot()
        .ok_or_else(|| ApiError::NotFound("No tour run exists".to_string()))?;

    let audio = session
        .narration
        .ok_or_else(|| ApiError::NotFound("No narration audio for this run".to_string()))?;

    let mut bytes = Vec::with_capacity(audio.samples.len() * 4);
    for sample in &audio.samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::HeaderName::from_static("x-sample-rate"),
                audio.sample_rate.to_string(),
            ),
            (
                header::HeaderName::from_static("x-channels"),
                audio.channels.to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// POST /tour/reset
///
/// Abandon any run and return the controller to Idle.
pub async fn reset_tour(State(state): State<AppState>) -> Json<ResetTourResponse> {
    state.controller.reset();

    Json(ResetTourResponse {
        state: PipelineState::Idle,
    })
}
