use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EstimateError;

/// Default multimodal endpoint host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default model used for estimates.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Trait for the remote multimodal model that produces the estimate.
#[async_trait]
pub trait EstimationClient: Send + Sync {
    /// Provider name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Whether a credential is available for the next call.
    fn has_credential(&self) -> bool {
        true
    }

    /// Perform exactly one outbound call and return the full response text.
    async fn request_estimate(&self, payload: &RequestPayload) -> Result<String, EstimateError>;
}

/// Multimodal request body in the `generateContent` wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl RequestPayload {
    /// All parts of all contents, in order.
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.contents.iter().flat_map(|c| c.parts.iter())
    }

    pub fn image_count(&self) -> usize {
        self.parts()
            .filter(|p| matches!(p, Part::InlineData { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Image part: media type plus base64 payload without the data-URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}
