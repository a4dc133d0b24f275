//! Inference Orchestrator
//!
//! Drives image validation and structured analysis across the ordered
//! provider chain.
//!
//! # States
//! `Idle → Validating → Analyzing → Succeeded | Rejected | Exhausted`
//! (`Cancelled` when the caller's token fires at any point)
//!
//! # Analysis iteration
//! Providers in configuration order, models in each provider's order. Per
//! (provider, model) pair up to `attempts_per_model` attempts with a fixed
//! delay in between and a hard per-attempt deadline.
//!
//! | failure                                   | next step                    |
//! |-------------------------------------------|------------------------------|
//! | timeout, network, 429, 5xx, bad payload   | retry same model             |
//! | model not found / unsupported, other 4xx  | next model                   |
//! | authentication                            | next provider                |
//! | business rejection                        | stop: `Rejected`             |
//!
//! Exhaustion reports `MalformedResponse` when every failure was an
//! unusable payload, `ProviderExhausted` otherwise.

use super::image_validator::{ImageValidator, ValidationOutcome};
use super::roof_analyzer::{AttemptFailure, RoofAnalyzer};
use super::{bounded_call, pause, Bounded};
use crate::config::InferenceSettings;
use crate::error::AnalysisError;
use crate::providers::ProviderEntry;
use crate::types::{
    AttemptLog, AttemptOutcome, AttemptStage, ImagePayload, ProviderError, Recovery,
};
use crate::validators::SanitizedAnalysis;
use serde::Serialize;
use sunplan_common::config::{InferenceConfig, RegionProfile};
use sunplan_common::models::AnalysisMode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Validating,
    Analyzing,
    Succeeded,
    Rejected,
    Exhausted,
    Cancelled,
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Succeeded
                | OrchestratorState::Rejected
                | OrchestratorState::Exhausted
                | OrchestratorState::Cancelled
        )
    }
}

/// Result of one orchestrated analysis
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub outcome: Result<SanitizedAnalysis, AnalysisError>,
    pub attempts: AttemptLog,
    /// Terminal state
    pub state: OrchestratorState,
    /// `(provider, model)` that produced the record
    pub served_by: Option<(String, String)>,
}

/// Mutable bookkeeping of a single run
struct RunTracker {
    state: OrchestratorState,
    log: AttemptLog,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: OrchestratorState::Idle,
            log: AttemptLog::new(),
        }
    }

    fn transition(&mut self, next: OrchestratorState) {
        if next.is_terminal() {
            info!(from = ?self.state, state = ?next, attempts = self.log.len(), "Orchestrator finished");
        } else {
            debug!(from = ?self.state, state = ?next, "Orchestrator transition");
        }
        self.state = next;
    }

    fn finish(
        mut self,
        state: OrchestratorState,
        outcome: Result<SanitizedAnalysis, AnalysisError>,
        served_by: Option<(String, String)>,
    ) -> AnalysisRun {
        self.transition(state);
        AnalysisRun {
            outcome,
            attempts: self.log,
            state: self.state,
            served_by,
        }
    }

    fn cancelled(self) -> AnalysisRun {
        self.finish(
            OrchestratorState::Cancelled,
            Err(AnalysisError::Cancelled),
            None,
        )
    }
}

/// Provider-agnostic analysis driver
pub struct InferenceOrchestrator {
    chain: Vec<ProviderEntry>,
    validator: ImageValidator,
    analyzer: RoofAnalyzer,
    settings: InferenceSettings,
}

impl InferenceOrchestrator {
    pub fn new(
        chain: Vec<ProviderEntry>,
        validator: ImageValidator,
        analyzer: RoofAnalyzer,
        settings: InferenceSettings,
    ) -> Self {
        Self {
            chain,
            validator,
            analyzer,
            settings,
        }
    }

    /// Wire validator and analyzer from configuration
    pub fn from_config(
        chain: Vec<ProviderEntry>,
        config: &InferenceConfig,
        region: &RegionProfile,
    ) -> Self {
        let settings = InferenceSettings::from_config(config);
        let validator =
            ImageValidator::from_chain(&chain, &config.validator, settings.attempt_timeout);
        let analyzer = RoofAnalyzer::new(
            region,
            settings.confidence_floor,
            settings.low_confidence_advisory_below,
        );
        Self::new(chain, validator, analyzer, settings)
    }

    pub fn chain(&self) -> &[ProviderEntry] {
        &self.chain
    }

    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    /// Validate then analyze one image
    pub async fn analyze(
        &self,
        image: &ImagePayload,
        mode: AnalysisMode,
        cancel: &CancellationToken,
    ) -> AnalysisRun {
        let mut run = RunTracker::new();

        run.transition(OrchestratorState::Validating);
        match self.validator.validate(image, &mut run.log, cancel).await {
            Err(_) => return run.cancelled(),
            Ok(ValidationOutcome::Valid) => {}
            Ok(ValidationOutcome::Invalid(reason)) => {
                info!(reason = %reason, "Image rejected by validator");
                return run.finish(
                    OrchestratorState::Rejected,
                    Err(AnalysisError::InvalidImage(reason)),
                    None,
                );
            }
            Ok(ValidationOutcome::Unavailable(last_error)) => {
                warn!(error = %last_error, "Image validation unavailable");
                return run.finish(
                    OrchestratorState::Exhausted,
                    Err(AnalysisError::ProviderExhausted { last_error }),
                    None,
                );
            }
        }

        run.transition(OrchestratorState::Analyzing);

        let attempts_per_model = self.settings.attempts_per_model.max(1);
        let mut last_error: Option<String> = None;
        let mut only_payload_failures = true;

        'providers: for entry in &self.chain {
            let provider = entry.provider.as_ref();

            'models: for model in &entry.models {
                for attempt in 1..=attempts_per_model {
                    let call = self.analyzer.request(provider, model, image, mode);
                    let reply =
                        match bounded_call(call, self.settings.attempt_timeout, cancel).await {
                            Bounded::Cancelled => return run.cancelled(),
                            Bounded::Done(reply) => reply,
                        };

                    let recovery = match self.analyzer.interpret(mode, reply) {
                        Ok(analysis) => {
                            run.log.push(
                                AttemptStage::Analysis,
                                provider.name(),
                                model,
                                attempt,
                                AttemptOutcome::Succeeded,
                            );
                            info!(
                                provider = %provider.name(),
                                model = %model,
                                attempt = attempt,
                                confidence = analysis.confidence(),
                                "Structured analysis succeeded"
                            );
                            let served_by = Some((provider.name().to_string(), model.clone()));
                            return run.finish(OrchestratorState::Succeeded, Ok(analysis), served_by);
                        }
                        Err(AttemptFailure::Rejected(rejection)) => {
                            run.log.push(
                                AttemptStage::Analysis,
                                provider.name(),
                                model,
                                attempt,
                                AttemptOutcome::Rejected(rejection.code().to_string()),
                            );
                            info!(
                                provider = %provider.name(),
                                model = %model,
                                reason = %rejection,
                                "Analysis rejected"
                            );
                            return run.finish(OrchestratorState::Rejected, Err(rejection), None);
                        }
                        Err(AttemptFailure::Malformed(detail)) => {
                            warn!(
                                provider = %provider.name(),
                                model = %model,
                                attempt = attempt,
                                error = %detail,
                                "Unusable analysis payload"
                            );
                            run.log.push(
                                AttemptStage::Analysis,
                                provider.name(),
                                model,
                                attempt,
                                AttemptOutcome::Failed(detail.clone()),
                            );
                            last_error = Some(detail);
                            Recovery::Retry
                        }
                        Err(AttemptFailure::Provider(error)) => {
                            warn!(
                                provider = %provider.name(),
                                model = %model,
                                attempt = attempt,
                                error = %error,
                                "Analysis attempt failed"
                            );
                            run.log.push(
                                AttemptStage::Analysis,
                                provider.name(),
                                model,
                                attempt,
                                AttemptOutcome::Failed(error.to_string()),
                            );
                            only_payload_failures &= matches!(
                                error,
                                ProviderError::EmptyResponse | ProviderError::Parse(_)
                            );
                            let recovery = error.recovery();
                            last_error = Some(error.to_string());
                            recovery
                        }
                    };

                    match recovery {
                        Recovery::NextModel => continue 'models,
                        Recovery::NextProvider => continue 'providers,
                        Recovery::Retry => {
                            if attempt < attempts_per_model
                                && !pause(self.settings.retry_delay, cancel).await
                            {
                                return run.cancelled();
                            }
                        }
                    }
                }
            }
        }

        let error = match last_error {
            None => AnalysisError::ProviderExhausted {
                last_error: "no inference provider configured".to_string(),
            },
            Some(last_error) if only_payload_failures => {
                AnalysisError::MalformedResponse { last_error }
            }
            Some(last_error) => AnalysisError::ProviderExhausted { last_error },
        };
        warn!(error = %error, "All provider/model combinations exhausted");
        run.finish(OrchestratorState::Exhausted, Err(error), None)
    }
}
