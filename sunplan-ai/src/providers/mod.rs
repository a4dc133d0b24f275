//! Inference provider backends
//!
//! Each backend is a separate strategy type implementing `VisionProvider`.
//!
//! # Backends
//! 1. **openai_compat** - any endpoint speaking the chat-completions protocol
//!    (OpenAI, OpenRouter, local llama.cpp / Ollama servers)
//! 2. **gemini** - Google Gemini `generateContent`
//!
//! `build_provider_chain` turns the configured provider list into the ordered
//! chain the orchestrator iterates. Order is exactly the configuration order.

pub mod gemini;
pub mod openai_compat;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

use crate::config::resolve_api_key;
use crate::types::{ProviderError, VisionProvider};
use std::sync::Arc;
use std::time::Duration;
use sunplan_common::config::{InferenceConfig, ProviderKind};
use tracing::{info, warn};

/// User-Agent header sent to every provider
pub(crate) const USER_AGENT: &str = concat!("sunplan/", env!("CARGO_PKG_VERSION"));

/// Transport-level ceiling; the orchestrator enforces the real per-attempt deadline
pub(crate) const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Generation parameters for the three kinds of provider call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallProfile {
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Ask the provider to constrain output to a JSON object
    pub json_output: bool,
}

impl CallProfile {
    /// Short deterministic classification
    pub const CLASSIFY: CallProfile = CallProfile {
        temperature: 0.0,
        max_output_tokens: 150,
        json_output: false,
    };

    /// Long structured extraction
    pub const EXTRACT: CallProfile = CallProfile {
        temperature: 0.1,
        max_output_tokens: 2048,
        json_output: true,
    };

    /// Narrative paragraph
    pub const NARRATE: CallProfile = CallProfile {
        temperature: 0.7,
        max_output_tokens: 400,
        json_output: false,
    };
}

/// One provider with its ordered models
#[derive(Clone)]
pub struct ProviderEntry {
    pub provider: Arc<dyn VisionProvider>,
    /// Vision models for structured analysis, in fallback order
    pub models: Vec<String>,
    /// Model for narrative text
    pub text_model: String,
}

impl ProviderEntry {
    pub fn new(provider: Arc<dyn VisionProvider>, models: Vec<String>) -> Self {
        let text_model = models.first().cloned().unwrap_or_default();
        Self {
            provider,
            models,
            text_model,
        }
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("provider", &self.provider.name())
            .field("models", &self.models)
            .field("text_model", &self.text_model)
            .finish()
    }
}

/// Build the ordered provider chain from configuration
///
/// Providers without a resolvable API key are skipped with a warning. An
/// empty chain is not an error here: every analysis then ends as
/// `ProviderExhausted`.
pub fn build_provider_chain(config: &InferenceConfig) -> Result<Vec<ProviderEntry>, ProviderError> {
    let mut chain = Vec::with_capacity(config.providers.len());

    for provider_config in &config.providers {
        let Some(api_key) = resolve_api_key(provider_config) else {
            warn!(
                provider = %provider_config.name,
                env = provider_config.api_key_env.as_deref().unwrap_or("<none>"),
                "No API key configured, provider skipped"
            );
            continue;
        };

        let provider: Arc<dyn VisionProvider> = match provider_config.kind {
            ProviderKind::OpenaiCompatible => Arc::new(OpenAiCompatProvider::new(
                provider_config.name.clone(),
                provider_config.base_url.clone(),
                api_key,
            )?),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(
                provider_config.name.clone(),
                provider_config.base_url.clone(),
                api_key,
            )?),
        };

        let mut entry = ProviderEntry::new(provider, provider_config.models.clone());
        if let Some(text_model) = &provider_config.text_model {
            entry = entry.with_text_model(text_model.clone());
        }

        info!(
            provider = %provider_config.name,
            models = ?entry.models,
            text_model = %entry.text_model,
            "Inference provider enabled"
        );
        chain.push(entry);
    }

    if chain.is_empty() {
        warn!("No inference provider is usable; image analysis will report ProviderExhausted");
    }

    Ok(chain)
}
