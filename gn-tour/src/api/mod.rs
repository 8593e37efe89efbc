//! HTTP API for gn-tour
//!
//! Presentation-facing shell: JSON endpoints plus an SSE progress stream.
//! Owns no pipeline state; everything goes through the controller.

mod health;
mod sse;
mod tour;

pub use health::health_routes;
pub use sse::tour_event_stream;
pub use tour::tour_routes;
