//! Shared types for GeoNarrate modules
//!
//! Provides the common error type, pipeline event definitions with the
//! EventBus, and configuration resolution used by the service crate.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, PipelineState, TourEvent};
