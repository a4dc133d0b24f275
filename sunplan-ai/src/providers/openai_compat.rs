//! OpenAI-compatible chat-completions backend
//!
//! Works against any server implementing `POST {base}/chat/completions`.
//! Images travel inline as `data:` URIs inside an `image_url` content part.

use super::{CallProfile, TRANSPORT_TIMEOUT, USER_AGENT};
use crate::types::{ImagePayload, ProviderError, VisionProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public OpenAI endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Chat-completions provider
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl OpenAiCompatProvider {
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
            .unwrap_or_else(|| OPENAI_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            name,
            base_url,
            api_key,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete(
        &self,
        model: &str,
        content: Vec<ContentPart<'_>>,
        profile: CallProfile,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            temperature: profile.temperature,
            max_tokens: profile.max_output_tokens,
            response_format: profile
                .json_output
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!(provider = %self.name, model = model, "Sending chat-completions request");

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed.into_text()
    }
}

#[async_trait]
impl VisionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify_image(
        &self,
        model: &str,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let content = vec![ContentPart::text(prompt), ContentPart::image(image)];
        self.complete(model, content, CallProfile::CLASSIFY).await
    }

    async fn extract_structured_analysis(
        &self,
        model: &str,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let content = vec![ContentPart::text(prompt), ContentPart::image(image)];
        self.complete(model, content, CallProfile::EXTRACT).await
    }

    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        self.complete(model, vec![ContentPart::text(prompt)], CallProfile::NARRATE)
            .await
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

impl<'a> ContentPart<'a> {
    fn text(text: &'a str) -> Self {
        ContentPart::Text { text }
    }

    fn image(image: &ImagePayload) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.to_data_uri(),
                detail: "high",
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}
