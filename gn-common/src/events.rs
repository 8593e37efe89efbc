//! Event types for the GeoNarrate event system
//!
//! Provides the shared pipeline state enum, event definitions, and the
//! EventBus used to broadcast pipeline progress to any number of observers
//! (the SSE layer being the usual one).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Tour pipeline state
///
/// Exactly one state is active at a time. The transition order is fixed:
/// `Idle → Identifying → Researching → Narrating → Succeeded`, with any
/// in-flight stage able to transition directly to `Failed`. `Idle` is the
/// only re-entrant state, reachable from a terminal state via an explicit
/// reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineState {
    /// No run in progress; ready to accept an image
    Idle,
    /// Vision analysis of the submitted photo
    Identifying,
    /// Search-grounded history retrieval for the identified landmark
    Researching,
    /// Speech synthesis of the history text plus PCM decode
    Narrating,
    /// Run finished; results available (narration may be absent)
    Succeeded,
    /// Run failed with a stored error message
    Failed,
}

impl PipelineState {
    /// Check whether this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}

/// GeoNarrate event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All pipeline observers consume this central enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TourEvent {
    /// Pipeline state changed
    PipelineStateChanged {
        /// Run this transition belongs to
        run_id: Uuid,
        /// State before the transition
        old_state: PipelineState,
        /// State after the transition
        new_state: PipelineState,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Human-readable progress update for the current stage
    PipelineProgress {
        run_id: Uuid,
        state: PipelineState,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Identify stage produced a landmark
    LandmarkIdentified {
        run_id: Uuid,
        name: String,
        location: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Research stage produced history text and grounding sources
    HistoryRetrieved {
        run_id: Uuid,
        /// Number of navigable grounding sources kept
        source_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration audio decoded and attached to the run
    NarrationReady {
        run_id: Uuid,
        duration_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration stage failed; the run continues without audio
    NarrationSkipped {
        run_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run reached the Succeeded terminal state
    PipelineSucceeded {
        run_id: Uuid,
        landmark_name: String,
        has_narration: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run reached the Failed terminal state
    PipelineFailed {
        run_id: Uuid,
        /// State in which the failure occurred
        state: PipelineState,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Controller returned to Idle (explicit reset)
    PipelineReset {
        /// Run that was abandoned, if one was in flight
        run_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TourEvent {
    /// Get event type as string for SSE filtering
    pub fn event_type(&self) -> &str {
        match self {
            TourEvent::PipelineStateChanged { .. } => "PipelineStateChanged",
            TourEvent::PipelineProgress { .. } => "PipelineProgress",
            TourEvent::LandmarkIdentified { .. } => "LandmarkIdentified",
            TourEvent::HistoryRetrieved { .. } => "HistoryRetrieved",
            TourEvent::NarrationReady { .. } => "NarrationReady",
            TourEvent::NarrationSkipped { .. } => "NarrationSkipped",
            TourEvent::PipelineSucceeded { .. } => "PipelineSucceeded",
            TourEvent::PipelineFailed { .. } => "PipelineFailed",
            TourEvent::PipelineReset { .. } => "PipelineReset",
        }
    }
}

/// Broadcast bus for pipeline events
///
/// Wraps a tokio broadcast channel. Events emitted while no subscriber is
/// listening are dropped (use `emit_lossy` when that is acceptable).
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TourEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TourEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TourEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<TourEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Pipeline progress is broadcast this way: it is acceptable for no
    /// component to be watching a run.
    pub fn emit_lossy(&self, event: TourEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> TourEvent {
        TourEvent::PipelineStateChanged {
            run_id: Uuid::new_v4(),
            old_state: PipelineState::Idle,
            new_state: PipelineState::Identifying,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_event_type_strings() {
        assert_eq!(sample_event().event_type(), "PipelineStateChanged");

        let failed = TourEvent::PipelineFailed {
            run_id: Uuid::new_v4(),
            state: PipelineState::Researching,
            message: "boom".to_string(),
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(failed.event_type(), "PipelineFailed");
    }

    #[test]
    fn test_state_serialization_uppercase() {
        let json = serde_json::to_string(&PipelineState::Identifying).unwrap();
        assert_eq!(json, "\"IDENTIFYING\"");

        let back: PipelineState = serde_json::from_str("\"SUCCEEDED\"").unwrap();
        assert_eq!(back, PipelineState::Succeeded);
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Succeeded.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Idle.is_terminal());
        assert!(!PipelineState::Narrating.is_terminal());
    }

    #[tokio::test]
    async fn test_emit_and_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(sample_event()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "PipelineStateChanged");
    }

    #[test]
    fn test_emit_lossy_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        // Must not panic with no subscribers
        bus.emit_lossy(sample_event());
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(4);
        assert!(bus.emit(sample_event()).is_err());
    }
}
