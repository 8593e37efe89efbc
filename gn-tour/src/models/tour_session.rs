//! Tour run state machine
//!
//! A run progresses through the fixed state order
//! IDLE → IDENTIFYING → RESEARCHING → NARRATING → SUCCEEDED,
//! with any in-flight stage able to fail the run. All accumulated data lives
//! on the session and is discarded wholesale on reset.

use chrono::{DateTime, Utc};
use gn_common::events::PipelineState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::NarrationAudio;

/// Identified landmark, produced once per run by the identify stage
///
/// Immutable after identification. An empty `name` is treated as an
/// identification failure even when the remote call itself succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkInfo {
    /// Landmark name
    pub name: String,
    /// City and country
    pub location: String,
    /// One-sentence description
    pub description: String,
}

/// Citation supporting the generated history text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingSource {
    /// Web resource backing the claim
    pub uri: String,
    /// Display title
    pub title: String,
}

/// Result of the research stage
///
/// Both fields may be empty; an empty history is still a valid terminal
/// value for the stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResult {
    /// Markdown history text
    pub text: String,
    /// Grounding sources, in citation order
    pub sources: Vec<GroundingSource>,
}

impl HistoryResult {
    /// Build a history result, discarding sources with an empty URI
    ///
    /// Sources without a navigable URI carry no value for the reader.
    pub fn new(text: String, sources: Vec<GroundingSource>) -> Self {
        let sources = sources.into_iter().filter(|s| !s.uri.is_empty()).collect();
        Self { text, sources }
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// Tour run (in-memory state)
///
/// Created fresh per run; the terminal snapshot doubles as the pipeline
/// result handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct TourSession {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Current pipeline state
    pub state: PipelineState,

    /// Identified landmark (set after the identify stage)
    pub landmark: Option<LandmarkInfo>,

    /// History text and sources (set after the research stage)
    pub history: Option<HistoryResult>,

    /// Decoded narration audio; None when narration was skipped or degraded
    pub narration: Option<NarrationAudio>,

    /// Why narration is absent, when the run degraded
    pub narration_error: Option<String>,

    /// Current operation description for the presentation layer
    pub progress_message: String,

    /// Terminal error message (Failed state only)
    pub error_message: Option<String>,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Run end time (terminal states only)
    pub ended_at: Option<DateTime<Utc>>,
}

impl TourSession {
    /// Create a new run in the Identifying state
    ///
    /// Runs are born past Idle: the controller transitions synchronously on
    /// `start()`, so a session object always belongs to an active run.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Identifying,
            landmark: None,
            history: None,
            narration: None,
            narration_error: None,
            progress_message: progress_label(PipelineState::Identifying, None),
            error_message: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, new_state: PipelineState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        let landmark_name = self.landmark.as_ref().map(|l| l.name.as_str());
        self.progress_message = progress_label(new_state, landmark_name);

        transition
    }

    /// Check if the run is finished
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Elapsed run time in seconds
    pub fn elapsed_seconds(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0) as u64
    }
}

impl Default for TourSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable progress label for a state
pub fn progress_label(state: PipelineState, landmark_name: Option<&str>) -> String {
    match state {
        PipelineState::Idle => "Ready".to_string(),
        PipelineState::Identifying => "Recognizing landmark...".to_string(),
        PipelineState::Researching => match landmark_name {
            Some(name) => format!("Fetching history for {}...", name),
            None => "Fetching history...".to_string(),
        },
        PipelineState::Narrating => "Generating audio narration...".to_string(),
        PipelineState::Succeeded => "Done".to_string(),
        PipelineState::Failed => "Failed".to_string(),
    }
}
