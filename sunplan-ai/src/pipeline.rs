//! Analysis pipeline
//!
//! Media check → (orchestrated inference ∥ location lookup) → recommendation
//! engine → narrative. The location lookup is the only work that runs
//! concurrently with inference; everything else is sequential per request.

use crate::config::InferenceSettings;
use crate::engine::{CostOptions, RecommendationEngine};
use crate::error::AnalysisError;
use crate::providers::build_provider_chain;
use crate::services::{
    FallbackGeocoder, FallbackIrradiance, Geocoder, InferenceOrchestrator, IrradianceSource,
    NarrativeSummarizer, NominatimGeocoder, PvgisIrradiance, RegionDefaultGeocoder,
    RegionDefaultIrradiance,
};
use crate::types::{AttemptLog, ImageMime, ImagePayload};
use crate::validators::SanitizedAnalysis;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use sunplan_common::config::{LocationConfig, PipelineConfig, RegionProfile, TomlConfig};
use sunplan_common::models::{
    Address, AnalysisMode, AnalysisReport, Coordinates, GeocodeResult, LocationSummary, Priority,
    RoofFindings, Suggestion, SuggestionCategory,
};
use sunplan_common::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// One analysis request as received from a caller
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,
    /// Declared mime type
    pub mime: String,
    pub address: Address,
    pub mode: AnalysisMode,
    pub monthly_bill: Option<f64>,
    pub cost_options: CostOptions,
}

/// Report plus every provider attempt made while producing it
#[derive(Debug)]
pub struct PipelineOutcome {
    pub analysis_id: Uuid,
    pub result: Result<AnalysisReport, AnalysisError>,
    pub attempts: AttemptLog,
}

/// End-to-end analysis service
pub struct AnalysisPipeline {
    orchestrator: InferenceOrchestrator,
    engine: RecommendationEngine,
    geocoder: Arc<dyn Geocoder>,
    irradiance: Arc<dyn IrradianceSource>,
    summarizer: NarrativeSummarizer,
    settings: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(
        orchestrator: InferenceOrchestrator,
        engine: RecommendationEngine,
        geocoder: Arc<dyn Geocoder>,
        irradiance: Arc<dyn IrradianceSource>,
        summarizer: NarrativeSummarizer,
        settings: PipelineConfig,
    ) -> Self {
        Self {
            orchestrator,
            engine,
            geocoder,
            irradiance,
            summarizer,
            settings,
        }
    }

    /// Wire every stage from the bootstrap configuration
    pub fn from_config(config: &TomlConfig) -> sunplan_common::Result<Self> {
        let chain = build_provider_chain(&config.inference)
            .map_err(|e| Error::Config(format!("Provider setup failed: {}", e)))?;

        let settings = InferenceSettings::from_config(&config.inference);
        let summarizer = NarrativeSummarizer::from_chain(
            &chain,
            config.pipeline.narrative_inference,
            settings.attempt_timeout,
            config.region.clone(),
        );
        let orchestrator =
            InferenceOrchestrator::from_config(chain, &config.inference, &config.region);
        let (geocoder, irradiance) = location_sources(&config.location, &config.region)?;

        Ok(Self::new(
            orchestrator,
            RecommendationEngine::new(config.region.clone()),
            geocoder,
            irradiance,
            summarizer,
            config.pipeline.clone(),
        ))
    }

    pub fn orchestrator(&self) -> &InferenceOrchestrator {
        &self.orchestrator
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    /// Check the declared type, size and content signature of an upload
    pub fn check_media(&self, bytes: &[u8], declared_mime: &str) -> Result<ImagePayload, AnalysisError> {
        let mime = ImageMime::from_declared(declared_mime).ok_or_else(|| {
            AnalysisError::UnsupportedMedia(format!("type '{}' is not JPEG or PNG", declared_mime))
        })?;

        if bytes.is_empty() {
            return Err(AnalysisError::UnsupportedMedia("empty image".to_string()));
        }
        if bytes.len() > self.settings.max_image_bytes {
            return Err(AnalysisError::UnsupportedMedia(format!(
                "image is {} bytes, limit is {}",
                bytes.len(),
                self.settings.max_image_bytes
            )));
        }
        if !mime.matches_signature(bytes) {
            return Err(AnalysisError::UnsupportedMedia(format!(
                "content is not a {} image",
                mime
            )));
        }

        Ok(ImagePayload::new(bytes.to_vec(), mime))
    }

    /// Analyze one request
    pub async fn run(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.run_traced(request, cancel).await.result
    }

    /// Analyze one request and keep the attempt log
    pub async fn run_traced(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let analysis_id = Uuid::new_v4();
        let mut attempts = AttemptLog::new();
        let result = self
            .execute(analysis_id, request, &mut attempts, cancel)
            .await;

        match &result {
            Ok(report) => info!(
                analysis_id = %analysis_id,
                panels = report.system_specs.panel_count,
                confidence = report.confidence,
                used_inference = report.used_inference,
                attempts = attempts.len(),
                "Analysis complete"
            ),
            Err(e) => info!(
                analysis_id = %analysis_id,
                code = e.code(),
                attempts = attempts.len(),
                "Analysis ended without report"
            ),
        }

        PipelineOutcome {
            analysis_id,
            result,
            attempts,
        }
    }

    async fn execute(
        &self,
        analysis_id: Uuid,
        request: AnalysisRequest,
        attempts: &mut AttemptLog,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport, AnalysisError> {
        let image = self.check_media(&request.image, &request.mime)?;
        info!(
            analysis_id = %analysis_id,
            mode = request.mode.as_str(),
            mime = %image.mime(),
            bytes = image.len(),
            "Analysis started"
        );

        let (run, location) = tokio::join!(
            self.orchestrator.analyze(&image, request.mode, cancel),
            self.locate(&request.address, cancel),
        );
        attempts.extend(run.attempts);

        let (analysis, analysis_used_inference) = match run.outcome {
            Ok(analysis) => (analysis, true),
            Err(AnalysisError::ProviderExhausted { last_error })
                if self.settings.degraded_estimate_on_exhaustion
                    && request.mode == AnalysisMode::NewInstallation =>
            {
                warn!(
                    analysis_id = %analysis_id,
                    error = %last_error,
                    "Providers exhausted, producing region-default estimate"
                );
                (self.degraded_analysis(), false)
            }
            Err(e) => return Err(e),
        };

        let SanitizedAnalysis {
            findings,
            advisories,
        } = analysis;
        let roof = findings.roof();

        let recommendation = self.engine.size_with(
            roof,
            &location.irradiance,
            request.monthly_bill,
            &request.cost_options,
        )?;

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let narrative = self
            .summarizer
            .summarize(
                &recommendation.financial_projection,
                roof,
                recommendation.system_specs.system_size_kw,
                &location,
                attempts,
                cancel,
            )
            .await;

        let mut suggestions = advisories;
        if let RoofFindings::ExistingInstallation(record) = &findings {
            suggestions.extend(record.improvements.iter().cloned());
        }
        suggestions.extend(recommendation.suggestions);

        let confidence = roof.confidence;
        Ok(AnalysisReport {
            analysis_id,
            generated_at: Utc::now(),
            findings,
            system_specs: recommendation.system_specs,
            financial_projection: recommendation.financial_projection,
            suggestions,
            suitability: recommendation.suitability,
            narrative_summary: narrative.text,
            confidence,
            used_inference: analysis_used_inference && narrative.used_inference,
            roof_used_inference: analysis_used_inference,
            narrative_used_inference: narrative.used_inference,
            location,
        })
    }

    /// Conservative roof estimate standing in for a failed analysis
    fn degraded_analysis(&self) -> SanitizedAnalysis {
        SanitizedAnalysis {
            findings: RoofFindings::NewInstallation(self.engine.conservative_roof()),
            advisories: vec![Suggestion::new(
                SuggestionCategory::Advisory,
                "Estimate based on regional averages",
                "The photo could not be analyzed right now. Figures assume a typical \
                 roof for the region; run the analysis again for a roof-specific result.",
                Priority::High,
            )],
        }
    }

    /// Geocode then look up irradiance; never fails
    async fn locate(&self, address: &Address, cancel: &CancellationToken) -> LocationSummary {
        let region = self.engine.region();
        let lookup = async {
            let geocode = match self.geocoder.geocode(address).await {
                Ok(geocode) => geocode,
                Err(e) => {
                    warn!(error = %e, "Geocoding failed, using region coordinates");
                    region_geocode(region)
                }
            };
            let irradiance = match self.irradiance.irradiance(geocode.coordinates).await {
                Ok(irradiance) => irradiance,
                Err(e) => {
                    warn!(error = %e, "Irradiance lookup failed, using region figures");
                    RegionDefaultIrradiance::new(region).figures()
                }
            };
            (geocode, irradiance)
        };

        let (geocode, irradiance) = tokio::select! {
            biased;
            _ = cancel.cancelled() => (
                region_geocode(region),
                RegionDefaultIrradiance::new(region).figures(),
            ),
            found = lookup => found,
        };

        LocationSummary {
            address: address.one_line(),
            coordinates: geocode.coordinates,
            used_real_geocoding: geocode.used_real_geocoding,
            irradiance,
        }
    }
}

fn region_geocode(region: &RegionProfile) -> GeocodeResult {
    GeocodeResult {
        coordinates: Coordinates {
            latitude: region.default_latitude,
            longitude: region.default_longitude,
        },
        used_real_geocoding: false,
    }
}

/// Geocoder and irradiance source for the configured lookup mode
fn location_sources(
    config: &LocationConfig,
    region: &RegionProfile,
) -> sunplan_common::Result<(Arc<dyn Geocoder>, Arc<dyn IrradianceSource>)> {
    if !config.live_lookup {
        return Ok((
            Arc::new(RegionDefaultGeocoder::new(region)),
            Arc::new(RegionDefaultIrradiance::new(region)),
        ));
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let nominatim = NominatimGeocoder::new(config.geocoder_url.clone(), timeout)
        .map_err(|e| Error::Config(format!("Geocoder setup failed: {}", e)))?;
    let pvgis = PvgisIrradiance::new(config.irradiance_url.clone(), timeout)
        .map_err(|e| Error::Config(format!("Irradiance source setup failed: {}", e)))?;

    info!(
        geocoder = %config.geocoder_url,
        irradiance = %config.irradiance_url,
        "Live location lookups enabled"
    );

    Ok((
        Arc::new(FallbackGeocoder::new(Arc::new(nominatim), region)),
        Arc::new(FallbackIrradiance::new(Arc::new(pvgis), region)),
    ))
}
