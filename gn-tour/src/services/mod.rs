//! Tour pipeline services

pub mod capability;
pub mod gemini_client;
pub mod pipeline;

pub use capability::{CapabilityError, ImagePayload, RemoteCapability};
pub use gemini_client::GeminiClient;
pub use pipeline::{PipelineController, PipelineError};
