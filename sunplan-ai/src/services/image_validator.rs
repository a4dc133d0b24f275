//! Image Validator
//!
//! One short classification call before the expensive structured analysis.
//! A failure of the primary model gets exactly one try on the fallback model
//! unless the provider rejected its API key; if the fallback fails too the
//! outcome is `Unavailable`, never a silent pass.

use super::{bounded_call, Bounded};
use crate::error::AnalysisError;
use crate::prompts;
use crate::providers::ProviderEntry;
use crate::types::{
    AttemptLog, AttemptOutcome, AttemptStage, ImagePayload, ProviderError, VisionProvider,
};
use crate::validators::{parse_verdict, Verdict};
use std::sync::Arc;
use std::time::Duration;
use sunplan_common::config::ValidatorConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Validator verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
    /// No model could classify the image; carries the last error for logs
    Unavailable(String),
}

/// Binary image gate
pub struct ImageValidator {
    provider: Option<Arc<dyn VisionProvider>>,
    primary_model: String,
    fallback_model: String,
    attempt_timeout: Duration,
    prompt: String,
}

impl ImageValidator {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            provider: Some(provider),
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            attempt_timeout,
            prompt: prompts::validation_prompt(),
        }
    }

    /// Validator with no provider; every image is `Unavailable`
    pub fn disabled() -> Self {
        Self {
            provider: None,
            primary_model: String::new(),
            fallback_model: String::new(),
            attempt_timeout: Duration::ZERO,
            prompt: String::new(),
        }
    }

    /// Pick the validator provider and models from the usable chain
    ///
    /// The configured models are used only with the configured provider;
    /// otherwise the first usable provider classifies with its own first two
    /// models.
    pub fn from_chain(
        chain: &[ProviderEntry],
        config: &ValidatorConfig,
        attempt_timeout: Duration,
    ) -> Self {
        let configured = config
            .provider
            .as_deref()
            .and_then(|name| chain.iter().find(|entry| entry.name() == name));

        if let Some(entry) = configured {
            return Self::new(
                entry.provider.clone(),
                config.primary_model.clone(),
                config.fallback_model.clone(),
                attempt_timeout,
            );
        }

        match chain.first() {
            Some(entry) => {
                let primary = entry.models.first().cloned().unwrap_or_default();
                let fallback = entry.models.get(1).cloned().unwrap_or_else(|| primary.clone());
                info!(
                    provider = %entry.name(),
                    primary = %primary,
                    fallback = %fallback,
                    "Validator provider not usable, classifying with first provider"
                );
                Self::new(entry.provider.clone(), primary, fallback, attempt_timeout)
            }
            None => Self::disabled(),
        }
    }

    /// Classify an image
    ///
    /// Returns `Err(AnalysisError::Cancelled)` only when the token fires.
    pub async fn validate(
        &self,
        image: &ImagePayload,
        log: &mut AttemptLog,
        cancel: &CancellationToken,
    ) -> Result<ValidationOutcome, AnalysisError> {
        let Some(provider) = &self.provider else {
            return Ok(ValidationOutcome::Unavailable(
                "no inference provider configured".to_string(),
            ));
        };

        let primary_error = match self
            .classify_once(provider.as_ref(), &self.primary_model, image, log, cancel)
            .await?
        {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };

        if matches!(primary_error, ProviderError::Unauthorized(_)) {
            return Ok(ValidationOutcome::Unavailable(primary_error.to_string()));
        }

        warn!(
            provider = %provider.name(),
            model = %self.primary_model,
            fallback = %self.fallback_model,
            error = %primary_error,
            "Validation failed, trying fallback model"
        );

        match self
            .classify_once(provider.as_ref(), &self.fallback_model, image, log, cancel)
            .await?
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => Ok(ValidationOutcome::Unavailable(e.to_string())),
        }
    }

    /// One classification call; an unrecognized reply counts as a failed attempt
    async fn classify_once(
        &self,
        provider: &dyn VisionProvider,
        model: &str,
        image: &ImagePayload,
        log: &mut AttemptLog,
        cancel: &CancellationToken,
    ) -> Result<Result<ValidationOutcome, ProviderError>, AnalysisError> {
        let call = provider.classify_image(model, image, &self.prompt);
        let result = match bounded_call(call, self.attempt_timeout, cancel).await {
            Bounded::Cancelled => return Err(AnalysisError::Cancelled),
            Bounded::Done(result) => result,
        };

        let verdict = result.and_then(|reply| {
            parse_verdict(&reply).ok_or_else(|| {
                ProviderError::Parse("unrecognized validation reply".to_string())
            })
        });

        let (outcome, attempt_outcome) = match verdict {
            Ok(Verdict::Valid) => (Ok(ValidationOutcome::Valid), AttemptOutcome::Succeeded),
            Ok(Verdict::Invalid(reason)) => (
                Ok(ValidationOutcome::Invalid(reason.clone())),
                AttemptOutcome::Rejected(reason),
            ),
            Err(e) => {
                let detail = e.to_string();
                (Err(e), AttemptOutcome::Failed(detail))
            }
        };

        debug!(
            provider = %provider.name(),
            model = model,
            outcome = ?attempt_outcome,
            "Validation attempt finished"
        );
        log.push(AttemptStage::Validation, provider.name(), model, 1, attempt_outcome);

        Ok(outcome)
    }
}
