//! Gemini API client
//!
//! Production implementation of the RemoteCapability contract against the
//! Gemini REST API: vision identification with a JSON response schema,
//! search-grounded history retrieval, and TTS narration returning inline
//! base64 PCM.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::{GroundingSource, HistoryResult, LandmarkInfo};
use crate::services::capability::{CapabilityError, ImagePayload, RemoteCapability};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const VISION_MODEL: &str = "gemini-2.5-flash";
const RESEARCH_MODEL: &str = "gemini-2.5-flash";
const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const TTS_VOICE: &str = "Zephyr";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Gemini client errors
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Response carried no usable payload: {0}")]
    EmptyResponse(String),
}

impl From<GeminiError> for CapabilityError {
    fn from(e: GeminiError) -> Self {
        CapabilityError::new(e.to_string())
    }
}

// Response structures (subset of the generateContent schema we consume)

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

/// Gemini API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GeminiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeminiError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }

    /// POST a generateContent request and return the parsed response
    async fn generate_content(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent", GEMINI_BASE_URL, model);

        tracing::debug!(model = %model, "Querying Gemini API");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeminiError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| GeminiError::ParseError(e.to_string()))
    }
}

/// Concatenated text of the first candidate's parts
fn candidate_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.as_ref())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl RemoteCapability for GeminiClient {
    async fn identify(&self, image: &ImagePayload) -> Result<LandmarkInfo, CapabilityError> {
        let prompt = "Analyze this image and identify the landmark. Provide its name, \
                      location (city, country), and a brief one-sentence description.";

        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": image.mime_type,
                            "data": general_purpose::STANDARD.encode(&image.data),
                        }
                    },
                    { "text": prompt },
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING", "description": "The name of the landmark." },
                        "location": { "type": "STRING", "description": "The city and country where the landmark is located." },
                        "description": { "type": "STRING", "description": "A brief one-sentence description of the landmark." }
                    },
                    "required": ["name", "location", "description"]
                }
            }
        });

        let response = self
            .generate_content(VISION_MODEL, body)
            .await
            .map_err(CapabilityError::from)?;

        let json_text = candidate_text(&response);
        let info: LandmarkInfo = serde_json::from_str(json_text.trim())
            .map_err(|e| GeminiError::ParseError(e.to_string()))
            .map_err(CapabilityError::from)?;

        tracing::info!(
            name = %info.name,
            location = %info.location,
            "Gemini identified landmark"
        );

        Ok(info)
    }

    async fn research(&self, landmark_name: &str) -> Result<HistoryResult, CapabilityError> {
        let prompt = format!(
            "Provide a concise and engaging history of {}. Focus on its origin, key \
             historical events, and its significance today. Format the response in markdown.",
            landmark_name
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "tools": [{ "googleSearch": {} }],
        });

        let response = self
            .generate_content(RESEARCH_MODEL, body)
            .await
            .map_err(CapabilityError::from)?;

        let text = candidate_text(&response);

        let sources: Vec<GroundingSource> = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.grounding_metadata.as_ref())
            .and_then(|m| m.grounding_chunks.as_ref())
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .map(|web| GroundingSource {
                        uri: web.uri.clone().unwrap_or_default(),
                        title: web
                            .title
                            .clone()
                            .unwrap_or_else(|| "Untitled Source".to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let history = HistoryResult::new(text, sources);

        tracing::info!(
            landmark = %landmark_name,
            source_count = history.sources.len(),
            "Gemini returned grounded history"
        );

        Ok(history)
    }

    async fn narrate(&self, text: &str) -> Result<String, CapabilityError> {
        let prompt = format!(
            "Narrate the following text in a clear, engaging, and slightly enthusiastic \
             tone, as if you are a tour guide: {}",
            text
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": TTS_VOICE }
                    }
                }
            }
        });

        let response = self
            .generate_content(TTS_MODEL, body)
            .await
            .map_err(CapabilityError::from)?;

        let audio_b64 = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.as_ref())
            .and_then(|parts| parts.first())
            .and_then(|p| p.inline_data.as_ref())
            .map(|d| d.data.clone());

        match audio_b64 {
            Some(data) => {
                tracing::info!(payload_len = data.len(), "Gemini returned narration audio");
                Ok(data)
            }
            None => Err(CapabilityError::from(GeminiError::EmptyResponse(
                "Failed to generate audio narration.".to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new("test-key".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn test_candidate_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "## His" }, { "text": "tory" }] }
            }]
        }))
        .unwrap();

        assert_eq!(candidate_text(&response), "## History");
    }

    #[test]
    fn test_candidate_text_empty_response() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(candidate_text(&response), "");
    }

    #[test]
    fn test_grounding_metadata_parsing() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "text" }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://x", "title": "X" } },
                        { "web": { "title": "no uri" } }
                    ]
                }
            }]
        }))
        .unwrap();

        let chunks = response.candidates.unwrap()[0]
            .grounding_metadata
            .as_ref()
            .unwrap()
            .grounding_chunks
            .as_ref()
            .unwrap()
            .len();
        assert_eq!(chunks, 2);
    }

    #[test]
    fn test_inline_data_parsing() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "inlineData": { "data": "AAAA" } }] }
            }]
        }))
        .unwrap();

        let data = response.candidates.unwrap()[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .as_ref()
            .unwrap()[0]
            .inline_data
            .as_ref()
            .unwrap()
            .data
            .clone();
        assert_eq!(data, "AAAA");
    }
}
