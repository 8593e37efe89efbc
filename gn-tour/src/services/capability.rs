//! Remote capability contract
//!
//! The pipeline depends on three opaque async operations and nothing else
//! about the remote service. Implementations live behind this trait; the
//! controller treats every failure as equivalent and does not distinguish
//! network, auth, or malformed-response causes.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{HistoryResult, LandmarkInfo};

/// Binary image payload plus MIME type
///
/// The MIME type is passed through to the capability unvalidated.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Raw image bytes
    pub data: Vec<u8>,
    /// MIME type string (e.g. "image/jpeg")
    pub mime_type: String,
}

/// Opaque capability failure
///
/// Carries only a message; the cause taxonomy is the capability's own
/// concern.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The three remote operations the pipeline sequences
#[async_trait]
pub trait RemoteCapability: Send + Sync {
    /// Identify the landmark in an image
    async fn identify(&self, image: &ImagePayload) -> Result<LandmarkInfo, CapabilityError>;

    /// Retrieve a sourced history for a named landmark
    async fn research(&self, landmark_name: &str) -> Result<HistoryResult, CapabilityError>;

    /// Synthesize spoken narration; returns base64-encoded raw PCM
    async fn narrate(&self, text: &str) -> Result<String, CapabilityError>;
}
