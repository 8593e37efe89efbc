//! Tour pipeline controller
//!
//! # State Progression
//! IDLE → IDENTIFYING → RESEARCHING → NARRATING → SUCCEEDED
//!
//! The controller sequences the three remote capability calls, threading
//! each stage's output into the next, and converts any failure into the
//! Failed terminal state. Exactly one run is in flight at a time: `start`
//! rejects while a session exists, and the three stages execute strictly
//! sequentially on one spawned task.
//!
//! # Stale-result guard
//! `reset()` does not abort an in-flight capability call (the capability
//! offers no cancellation handle). Instead every session write is guarded by
//! a run generation counter: reset bumps the generation, so a continuation
//! belonging to an abandoned run finds its generation stale and discards its
//! result instead of corrupting a newer run. A CancellationToken additionally
//! short-circuits the remaining stages of an abandoned run so no further
//! remote calls are issued on its behalf.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use gn_common::events::{EventBus, PipelineState, TourEvent};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{self, NARRATION_SAMPLE_RATE};
use crate::models::TourSession;
use crate::services::capability::{ImagePayload, RemoteCapability};

/// User-facing message for identification failures, kept distinct from
/// generic stage failures so the presentation layer can surface it verbatim.
const IDENTIFY_FAILURE_MESSAGE: &str =
    "Could not identify a landmark in the image. Please try another photo.";

/// Pipeline controller errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start` called while a run exists; a logic fault in the caller,
    /// not a recoverable condition
    #[error("Pipeline is not idle (current state: {0:?})")]
    InvalidState(PipelineState),
}

struct Inner {
    /// Current run; None means Idle
    session: Option<TourSession>,
    /// Soft-cancel handle for the current run
    cancel: Option<CancellationToken>,
}

/// The tour pipeline state machine
///
/// One live controller per service instance. State and accumulated data are
/// the only externally visible effects; observers read consistent snapshots
/// and listen on the event bus.
pub struct PipelineController {
    inner: Mutex<Inner>,
    /// Run generation; bumped on reset to strand stale continuations
    generation: AtomicU64,
    capability: Arc<dyn RemoteCapability>,
    event_bus: EventBus,
}

impl PipelineController {
    pub fn new(capability: Arc<dyn RemoteCapability>, event_bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                session: None,
                cancel: None,
            }),
            generation: AtomicU64::new(0),
            capability,
            event_bus,
        })
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        let inner = self.inner.lock().unwrap();
        inner
            .session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(PipelineState::Idle)
    }

    /// Consistent copy of the current run, if one exists
    ///
    /// Taken under the same lock every commit holds, so a snapshot never
    /// shows a state update without its corresponding data.
    pub fn snapshot(&self) -> Option<TourSession> {
        self.inner.lock().unwrap().session.clone()
    }

    /// Begin a new run
    ///
    /// Transitions Idle → Identifying synchronously, then proceeds on a
    /// background task. Rejected while any run exists, including a terminal
    /// one awaiting an explicit `reset()`.
    pub fn start(self: &Arc<Self>, image: ImagePayload) -> Result<Uuid, PipelineError> {
        let (run_id, generation, cancel) = {
            let mut inner = self.inner.lock().unwrap();

            if let Some(session) = &inner.session {
                return Err(PipelineError::InvalidState(session.state));
            }

            let session = TourSession::new();
            let run_id = session.run_id;
            let cancel = CancellationToken::new();

            inner.session = Some(session);
            inner.cancel = Some(cancel.clone());

            (run_id, self.generation.load(Ordering::SeqCst), cancel)
        };

        tracing::info!(run_id = %run_id, "Tour pipeline started");

        self.event_bus.emit_lossy(TourEvent::PipelineStateChanged {
            run_id,
            old_state: PipelineState::Idle,
            new_state: PipelineState::Identifying,
            timestamp: Utc::now(),
        });
        self.event_bus.emit_lossy(TourEvent::PipelineProgress {
            run_id,
            state: PipelineState::Identifying,
            message: "Recognizing landmark...".to_string(),
            timestamp: Utc::now(),
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run(generation, cancel, run_id, image).await;
        });

        Ok(run_id)
    }

    /// Abandon any run and return to Idle
    ///
    /// Safe to call from any state. Bumps the run generation so pending
    /// continuations of the abandoned run no-op, and cancels the run token
    /// so its remaining stages are skipped.
    pub fn reset(&self) {
        let abandoned = {
            let mut inner = self.inner.lock().unwrap();
            self.generation.fetch_add(1, Ordering::SeqCst);

            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }

            inner.session.take().map(|s| s.run_id)
        };

        if let Some(run_id) = abandoned {
            tracing::info!(run_id = %run_id, "Tour pipeline reset, run abandoned");
        }

        self.event_bus.emit_lossy(TourEvent::PipelineReset {
            run_id: abandoned,
            timestamp: Utc::now(),
        });
    }

    /// Apply a session mutation if the continuation's generation is still
    /// current, collecting the events to broadcast
    ///
    /// Returns false when the run was abandoned; the caller must stop.
    fn commit<F>(&self, generation: u64, mutate: F) -> bool
    where
        F: FnOnce(&mut TourSession, &mut Vec<TourEvent>),
    {
        let events = {
            let mut inner = self.inner.lock().unwrap();

            // Stale-result guard
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            let Some(session) = inner.session.as_mut() else {
                return false;
            };

            let mut events = Vec::new();
            mutate(session, &mut events);
            events
        };

        for event in events {
            self.event_bus.emit_lossy(event);
        }
        true
    }

    /// Fail the run with a stored message
    fn fail(&self, generation: u64, message: String) {
        self.commit(generation, |session, events| {
            let failed_in = session.state;
            session.error_message = Some(message.clone());
            let transition = session.transition_to(PipelineState::Failed);

            tracing::warn!(
                run_id = %session.run_id,
                state = ?failed_in,
                error = %message,
                "Tour pipeline failed"
            );

            events.push(TourEvent::PipelineFailed {
                run_id: session.run_id,
                state: failed_in,
                message,
                timestamp: Utc::now(),
            });
            events.push(TourEvent::PipelineStateChanged {
                run_id: session.run_id,
                old_state: transition.old_state,
                new_state: PipelineState::Failed,
                timestamp: transition.transitioned_at,
            });
        });
    }

    /// Execute the three stages for one run
    async fn run(
        self: Arc<Self>,
        generation: u64,
        cancel: CancellationToken,
        run_id: Uuid,
        image: ImagePayload,
    ) {
        // Stage 1: IDENTIFYING - vision analysis of the photo
        let landmark = match self.capability.identify(&image).await {
            Ok(info) if !info.name.is_empty() => info,
            Ok(_) => {
                // Remote call succeeded but produced no usable name; a
                // domain invariant violation, not a transport error
                self.fail(generation, IDENTIFY_FAILURE_MESSAGE.to_string());
                return;
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "Identify stage failed");
                self.fail(generation, IDENTIFY_FAILURE_MESSAGE.to_string());
                return;
            }
        };

        let landmark_name = landmark.name.clone();
        let committed = self.commit(generation, |session, events| {
            session.landmark = Some(landmark.clone());
            let transition = session.transition_to(PipelineState::Researching);

            events.push(TourEvent::LandmarkIdentified {
                run_id: session.run_id,
                name: landmark.name.clone(),
                location: landmark.location.clone(),
                timestamp: Utc::now(),
            });
            events.push(TourEvent::PipelineStateChanged {
                run_id: session.run_id,
                old_state: transition.old_state,
                new_state: transition.new_state,
                timestamp: transition.transitioned_at,
            });
            events.push(TourEvent::PipelineProgress {
                run_id: session.run_id,
                state: PipelineState::Researching,
                message: session.progress_message.clone(),
                timestamp: Utc::now(),
            });
        });
        if !committed || cancel.is_cancelled() {
            return;
        }

        // Stage 2: RESEARCHING - search-grounded history retrieval
        let history = match self.capability.research(&landmark_name).await {
            Ok(history) => history,
            Err(e) => {
                self.fail(generation, format!("Failed to fetch landmark history: {}", e));
                return;
            }
        };

        let history_text = history.text.clone();
        let committed = self.commit(generation, |session, events| {
            let source_count = history.sources.len();
            session.history = Some(history.clone());
            let transition = session.transition_to(PipelineState::Narrating);

            events.push(TourEvent::HistoryRetrieved {
                run_id: session.run_id,
                source_count,
                timestamp: Utc::now(),
            });
            events.push(TourEvent::PipelineStateChanged {
                run_id: session.run_id,
                old_state: transition.old_state,
                new_state: transition.new_state,
                timestamp: transition.transitioned_at,
            });
            events.push(TourEvent::PipelineProgress {
                run_id: session.run_id,
                state: PipelineState::Narrating,
                message: session.progress_message.clone(),
                timestamp: Utc::now(),
            });
        });
        if !committed || cancel.is_cancelled() {
            return;
        }

        // Stage 3: NARRATING - speech synthesis + PCM decode. Narration of
        // empty history text is still attempted; the capability decides.
        let narration = match self.capability.narrate(&history_text).await {
            Ok(audio_b64) => audio::decode_base64(&audio_b64)
                .and_then(|bytes| audio::decode_pcm(&bytes, NARRATION_SAMPLE_RATE, 1))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        // Degraded-success policy: a narration failure must not discard the
        // identification and history already in hand
        self.commit(generation, |session, events| {
            let has_narration = narration.is_ok();

            match narration {
                Ok(audio) => {
                    tracing::info!(
                        run_id = %session.run_id,
                        duration_seconds = audio.duration_seconds(),
                        "Narration decoded"
                    );
                    events.push(TourEvent::NarrationReady {
                        run_id: session.run_id,
                        duration_seconds: audio.duration_seconds(),
                        timestamp: Utc::now(),
                    });
                    session.narration = Some(audio);
                }
                Err(reason) => {
                    tracing::warn!(
                        run_id = %session.run_id,
                        error = %reason,
                        "Narration failed, delivering results without audio"
                    );
                    events.push(TourEvent::NarrationSkipped {
                        run_id: session.run_id,
                        reason: reason.clone(),
                        timestamp: Utc::now(),
                    });
                    session.narration_error = Some(reason);
                }
            }

            let transition = session.transition_to(PipelineState::Succeeded);

            events.push(TourEvent::PipelineStateChanged {
                run_id: session.run_id,
                old_state: transition.old_state,
                new_state: transition.new_state,
                timestamp: transition.transitioned_at,
            });
            events.push(TourEvent::PipelineSucceeded {
                run_id: session.run_id,
                landmark_name: landmark_name.clone(),
                has_narration,
                timestamp: Utc::now(),
            });
        });
    }
}
