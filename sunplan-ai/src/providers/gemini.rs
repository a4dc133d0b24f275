//! Google Gemini backend
//!
//! Calls `POST {base}/models/{model}:generateContent` with the image inlined
//! as base64 `inline_data`. The key travels in the `x-goog-api-key` header.

use super::{CallProfile, TRANSPORT_TIMEOUT, USER_AGENT};
use crate::types::{ImagePayload, ProviderError, VisionProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` provider
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl GeminiProvider {
    pub fn new(
        name: String,
        base_url: Option<String>,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TRANSPORT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let base_url = base_url
            .unwrap_or_else(|| GEMINI_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            name,
            base_url,
            api_key,
            http_client,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<Part>,
        profile: CallProfile,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: profile.temperature,
                max_output_tokens: profile.max_output_tokens,
                response_mime_type: profile.json_output.then_some("application/json"),
            },
        };

        debug!(provider = %self.name, model = model, "Sending generateContent request");

        let response = self
            .http_client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed.into_text()
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify_image(
        &self,
        model: &str,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let parts = vec![Part::text(prompt), Part::image(image)];
        self.generate(model, parts, CallProfile::CLASSIFY).await
    }

    async fn extract_structured_analysis(
        &self,
        model: &str,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let parts = vec![Part::text(prompt), Part::image(image)];
        self.generate(model, parts, CallProfile::EXTRACT).await
    }

    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        self.generate(model, vec![Part::text(prompt)], CallProfile::NARRATE)
            .await
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

impl Part {
    fn text(text: &str) -> Self {
        Part::Text {
            text: text.to_string(),
        }
    }

    fn image(image: &ImagePayload) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: image.mime().as_str(),
                data: image.to_base64(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        // A blocked prompt is deterministic for this model; resending cannot help
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Api {
                status: 200,
                message: format!("prompt blocked: {}", reason),
            });
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}
