//! Core Types and Trait Definitions for sunplan-ai
//!
//! Defines the provider capability trait every inference backend implements,
//! the image payload handed to it, and the classified provider error that
//! drives the orchestrator's recovery policy.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Image Payload
// ============================================================================

/// Accepted image media types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl ImageMime {
    /// Parse a declared mime type; anything but JPEG or PNG is unsupported
    pub fn from_declared(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            "image/png" => Some(ImageMime::Png),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Png => "image/png",
        }
    }

    /// Check the leading magic bytes agree with the declared type
    pub fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            ImageMime::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            ImageMime::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image bytes plus declared media type, cheap to clone across attempts
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Arc<[u8]>,
    mime: ImageMime,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: ImageMime) -> Self {
        Self {
            bytes: bytes.into(),
            mime,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 encoding of the image bytes
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:` URI form used by chat-completions style APIs
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime.as_str(), self.to_base64())
    }
}

// ============================================================================
// Provider Errors
// ============================================================================

/// Classified provider failure
///
/// Raw provider messages are kept for diagnostic logging only; callers see
/// the taxonomy in `crate::error::AnalysisError`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Attempt exceeded its hard deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS or TLS failure
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429 or provider quota message
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Model unknown to the provider or unsupported for this request
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Key missing, invalid or lacking permission
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 5xx
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Other non-success HTTP status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider answered without any text content
    #[error("Empty response")]
    EmptyResponse,

    /// Provider envelope could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

/// What the orchestrator does after a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Try the same model again after the fixed delay
    Retry,
    /// Abandon this model, keep remaining models of the provider
    NextModel,
    /// Abandon every remaining model of this provider
    NextProvider,
}

impl ProviderError {
    pub fn recovery(&self) -> Recovery {
        match self {
            ProviderError::ModelNotFound(_) => Recovery::NextModel,
            ProviderError::Unauthorized(_) => Recovery::NextProvider,
            // A 4xx other than 404/429 is a request the model rejects; resending it
            // verbatim cannot succeed
            ProviderError::Api { .. } => Recovery::NextModel,
            ProviderError::Timeout(_)
            | ProviderError::Network(_)
            | ProviderError::RateLimited(_)
            | ProviderError::Server { .. }
            | ProviderError::EmptyResponse
            | ProviderError::Parse(_) => Recovery::Retry,
        }
    }

    /// Classify a non-success HTTP status plus body text
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate_for_log(body);
        let lowered = body.to_ascii_lowercase();
        let mentions_missing_model = lowered.contains("model")
            && (lowered.contains("not found")
                || lowered.contains("does not exist")
                || lowered.contains("not supported")
                || lowered.contains("unsupported"));

        match status {
            401 | 403 => ProviderError::Unauthorized(message),
            404 => ProviderError::ModelNotFound(message),
            429 => ProviderError::RateLimited(message),
            400 if mentions_missing_model => ProviderError::ModelNotFound(message),
            500..=599 => ProviderError::Server { status, message },
            _ => ProviderError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Network(format!("transport timeout: {}", err))
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

fn truncate_for_log(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut end = MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

// ============================================================================
// Provider Capability Trait
// ============================================================================

/// Capability interface every inference backend implements
///
/// The orchestrator is provider-agnostic: it only sees this trait. Each
/// method returns the provider's raw text content; parsing and validation
/// happen in `crate::validators`.
///
/// # Example
/// ```rust,ignore
/// use sunplan_ai::types::{ImagePayload, VisionProvider};
///
/// let reply = provider
///     .classify_image("gemini-2.0-flash", &image, &prompt)
///     .await?;
/// ```
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name for logs and the attempt log
    fn name(&self) -> &str;

    /// Short, deterministic classification call
    async fn classify_image(
        &self,
        model: &str,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<String, ProviderError>;

    /// Long structured-extraction call expected to return a JSON object
    async fn extract_structured_analysis(
        &self,
        model: &str,
        image: &ImagePayload,
        prompt: &str,
    ) -> Result<String, ProviderError>;

    /// Text-only generation
    async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

// ============================================================================
// Attempt Log
// ============================================================================

/// Which provider call an attempt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Validation,
    Analysis,
    Narrative,
}

/// How one provider call ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Parsed and accepted
    Succeeded,
    /// Parsed, and the answer rejects the analysis (code of the rejection)
    Rejected(String),
    /// Provider error, timeout or unusable payload
    Failed(String),
}

/// One provider call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub stage: AttemptStage,
    pub provider: String,
    pub model: String,
    /// 1-based attempt number for this (provider, model) pair
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

/// Ordered record of every provider call made for one analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttemptLog {
    records: Vec<AttemptRecord>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        stage: AttemptStage,
        provider: &str,
        model: &str,
        attempt: u32,
        outcome: AttemptOutcome,
    ) {
        self.records.push(AttemptRecord {
            stage,
            provider: provider.to_string(),
            model: model.to_string(),
            attempt,
            outcome,
        });
    }

    /// Append every record of another log, keeping order
    pub fn extend(&mut self, other: AttemptLog) {
        self.records.extend(other.records);
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Calls made during one stage
    pub fn count(&self, stage: AttemptStage) -> usize {
        self.records.iter().filter(|r| r.stage == stage).count()
    }

    /// `(provider, model)` of every call in a stage, in call order
    pub fn sequence(&self, stage: AttemptStage) -> Vec<(String, String)> {
        self.records
            .iter()
            .filter(|r| r.stage == stage)
            .map(|r| (r.provider.clone(), r.model.clone()))
            .collect()
    }
}
