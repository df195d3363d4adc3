//! Estimation client for Google Gemini `generateContent`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use kaitai_core::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, EstimateError, EstimationClient, RequestPayload,
};
use kaitai_logging::redact_sensitive_data;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini multimodal provider. One HTTPS call per estimate, no retries.
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined verbatim.
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    fn missing_text_reason(&self) -> String {
        if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            return format!("the provider blocked the request ({reason})");
        }
        match self.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            Some(reason) => format!("the provider returned no text (finish reason {reason})"),
            None => "the provider returned no text".to_string(),
        }
    }
}

fn provider_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
}

#[async_trait]
impl EstimationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request_estimate(&self, payload: &RequestPayload) -> Result<String, EstimateError> {
        let start = Instant::now();
        info!(
            model = %self.model,
            images = payload.image_count(),
            "Requesting estimate from Gemini"
        );

        let mut request = self.client.post(self.endpoint()).json(payload);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(|e| {
            EstimateError::Transport(format!(
                "network request failed: {}",
                redact_sensitive_data(&e.to_string())
            ))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = provider_error_message(&body).unwrap_or(body);
            return Err(EstimateError::Transport(format!(
                "provider returned {status}: {}",
                redact_sensitive_data(detail.trim())
            )));
        }

        let body: GenerateContentResponse = resp.json().await.map_err(|e| {
            EstimateError::Unknown(format!("could not decode provider response: {e}"))
        })?;

        let text = body
            .text()
            .ok_or_else(|| EstimateError::Unknown(body.missing_text_reason()))?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "Gemini estimate received"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use kaitai_core::{Content, InlineData, Part};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    fn payload() -> RequestPayload {
        RequestPayload {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![
                    Part::Text { text: "estimate".into() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".into(),
                            data: "AQID".into(),
                        },
                    },
                ],
            }],
            generation_config: None,
        }
    }

    async fn serve(status: StatusCode, body: Value) -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/v1beta/models/:model",
                post(
                    move |State(captured): State<Captured>, headers: HeaderMap, Json(req): Json<Value>| {
                        let body = body.clone();
                        async move {
                            let key = headers
                                .get(API_KEY_HEADER)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            captured.requests.lock().unwrap().push((key, req));
                            (status, Json(body))
                        }
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let (url, captured) = serve(
            StatusCode::OK,
            json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "解体費用は" }, { "text": "約200万円です" }] },
                    "finishReason": "STOP"
                }]
            }),
        )
        .await;

        let client = GeminiClient::new(Some("test-key".into())).with_base_url(url);
        let text = client.request_estimate(&payload()).await.unwrap();
        assert_eq!(text, "解体費用は約200万円です");

        let requests = captured.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (key, body) = &requests[0];
        assert_eq!(key.as_deref(), Some("test-key"));
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
    }

    #[tokio::test]
    async fn provider_error_is_transport_with_detail() {
        let (url, _) = serve(
            StatusCode::BAD_REQUEST,
            json!({ "error": { "code": 400, "message": "API key not valid. Please pass a valid API key." } }),
        )
        .await;

        let client = GeminiClient::new(Some("bad".into())).with_base_url(url);
        let err = client.request_estimate(&payload()).await.unwrap_err();
        assert!(
            matches!(&err, EstimateError::Transport(d) if d.contains("400") && d.contains("API key not valid")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn blocked_prompt_is_unknown_error() {
        let (url, _) = serve(
            StatusCode::OK,
            json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
        )
        .await;

        let client = GeminiClient::new(Some("k".into())).with_base_url(url);
        let err = client.request_estimate(&payload()).await.unwrap_err();
        assert_eq!(
            err,
            EstimateError::Unknown("the provider blocked the request (SAFETY)".into())
        );
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GeminiClient::new(Some("k".into())).with_base_url(format!("http://{addr}"));
        let err = client.request_estimate(&payload()).await.unwrap_err();
        assert!(
            matches!(&err, EstimateError::Transport(d) if d.starts_with("network request failed")),
            "{err:?}"
        );
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(!GeminiClient::new(None).has_credential());
        assert!(!GeminiClient::new(Some("  ".into())).has_credential());
        assert!(GeminiClient::new(Some("k".into())).has_credential());
    }

    #[test]
    fn uses_shared_provider_defaults() {
        let client = GeminiClient::new(None);
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(
            client.endpoint(),
            format!("{DEFAULT_BASE_URL}/v1beta/models/{DEFAULT_MODEL}:generateContent")
        );
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new(None)
            .with_base_url("http://localhost:9/")
            .with_model("gemini-1.5-pro");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }
}
