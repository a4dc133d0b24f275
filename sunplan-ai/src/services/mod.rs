//! Analysis services
//!
//! - **image_validator** - cheap gate rejecting unusable images
//! - **roof_analyzer** - one structured extraction call plus sanitizing
//! - **inference_orchestrator** - provider/model iteration, retries, states
//! - **narrative_summarizer** - narrative paragraph with template fallback
//! - **geocoder** / **irradiance** - best-effort location collaborators

pub mod geocoder;
pub mod image_validator;
pub mod inference_orchestrator;
pub mod irradiance;
pub mod narrative_summarizer;
pub mod roof_analyzer;

pub use geocoder::{FallbackGeocoder, Geocoder, LookupError, NominatimGeocoder, RegionDefaultGeocoder};
pub use image_validator::{ImageValidator, ValidationOutcome};
pub use inference_orchestrator::{AnalysisRun, InferenceOrchestrator, OrchestratorState};
pub use irradiance::{FallbackIrradiance, IrradianceSource, PvgisIrradiance, RegionDefaultIrradiance};
pub use narrative_summarizer::{Narrative, NarrativeSummarizer};
pub use roof_analyzer::{AttemptFailure, RoofAnalyzer};

use crate::types::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of a provider call raced against its deadline and the caller's token
#[derive(Debug)]
pub(crate) enum Bounded<T> {
    Done(Result<T, ProviderError>),
    Cancelled,
}

/// Run one provider call under a hard deadline, abandoning it on cancellation
///
/// A timeout surfaces as `ProviderError::Timeout`; dropping the call future
/// aborts the in-flight request.
pub(crate) async fn bounded_call<T, F>(
    call: F,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Bounded<T>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Bounded::Cancelled,
        result = tokio::time::timeout(deadline, call) => match result {
            Ok(inner) => Bounded::Done(inner),
            Err(_) => Bounded::Done(Err(ProviderError::Timeout(deadline))),
        },
    }
}

/// Sleep unless cancelled first; false when cancelled
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_becomes_timeout() {
        let cancel = CancellationToken::new();
        let result: Bounded<()> = bounded_call(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            Duration::from_secs(15),
            &cancel,
        )
        .await;
        assert!(matches!(
            result,
            Bounded::Done(Err(ProviderError::Timeout(d))) if d == Duration::from_secs(15)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Bounded<u8> =
            bounded_call(async { Ok(1) }, Duration::from_secs(1), &cancel).await;
        assert!(matches!(result, Bounded::Cancelled));
        assert!(!pause(Duration::from_secs(5), &cancel).await);
    }
}
