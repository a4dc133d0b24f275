//! Narrative Summarizer
//!
//! One text call turning the computed numbers into a short paragraph. Any
//! failure falls back to a deterministic template built from the same
//! numbers, so the summary is never empty and never fails the pipeline.

use super::{bounded_call, Bounded};
use crate::engine::suggestions::needs_tilt_brackets;
use crate::prompts;
use crate::providers::ProviderEntry;
use crate::types::{AttemptLog, AttemptOutcome, AttemptStage, VisionProvider};
use std::sync::Arc;
use std::time::Duration;
use sunplan_common::config::RegionProfile;
use sunplan_common::models::{
    FinancialProjection, LocationSummary, Orientation, RoofRecord, Shading,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Finished summary paragraph
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub text: String,
    /// False when the template stood in for inference
    pub used_inference: bool,
}

/// Narrative generator with template fallback
pub struct NarrativeSummarizer {
    provider: Option<Arc<dyn VisionProvider>>,
    model: String,
    timeout: Duration,
    region: RegionProfile,
}

impl NarrativeSummarizer {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        model: impl Into<String>,
        timeout: Duration,
        region: RegionProfile,
    ) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            timeout,
            region,
        }
    }

    /// Summarizer that always uses the template
    pub fn template_only(region: RegionProfile) -> Self {
        Self {
            provider: None,
            model: String::new(),
            timeout: Duration::ZERO,
            region,
        }
    }

    /// Narrate with the first provider's text model, or template only when
    /// disabled or no provider is usable
    pub fn from_chain(
        chain: &[ProviderEntry],
        enabled: bool,
        timeout: Duration,
        region: RegionProfile,
    ) -> Self {
        match chain.first() {
            Some(entry) if enabled && !entry.text_model.is_empty() => Self::new(
                entry.provider.clone(),
                entry.text_model.clone(),
                timeout,
                region,
            ),
            _ => Self::template_only(region),
        }
    }

    /// Produce the summary paragraph
    pub async fn summarize(
        &self,
        projection: &FinancialProjection,
        roof: &RoofRecord,
        system_size_kw: f64,
        location: &LocationSummary,
        log: &mut AttemptLog,
        cancel: &CancellationToken,
    ) -> Narrative {
        let Some(provider) = &self.provider else {
            return self.fallback(projection, roof, system_size_kw, location);
        };

        let prompt = prompts::narrative_prompt(
            projection,
            roof,
            system_size_kw,
            location,
            &self.region.currency,
        );
        let call = provider.generate_text(&self.model, &prompt);

        let reply = match bounded_call(call, self.timeout, cancel).await {
            Bounded::Cancelled => {
                debug!("Narrative call cancelled, using template");
                return self.fallback(projection, roof, system_size_kw, location);
            }
            Bounded::Done(reply) => reply,
        };

        match reply {
            Ok(text) if !text.trim().is_empty() => {
                log.push(
                    AttemptStage::Narrative,
                    provider.name(),
                    &self.model,
                    1,
                    AttemptOutcome::Succeeded,
                );
                Narrative {
                    text: text.trim().to_string(),
                    used_inference: true,
                }
            }
            Ok(_) => {
                warn!(provider = %provider.name(), model = %self.model, "Empty narrative, using template");
                log.push(
                    AttemptStage::Narrative,
                    provider.name(),
                    &self.model,
                    1,
                    AttemptOutcome::Failed("empty narrative".to_string()),
                );
                self.fallback(projection, roof, system_size_kw, location)
            }
            Err(e) => {
                warn!(
                    provider = %provider.name(),
                    model = %self.model,
                    error = %e,
                    "Narrative call failed, using template"
                );
                log.push(
                    AttemptStage::Narrative,
                    provider.name(),
                    &self.model,
                    1,
                    AttemptOutcome::Failed(e.to_string()),
                );
                self.fallback(projection, roof, system_size_kw, location)
            }
        }
    }

    fn fallback(
        &self,
        projection: &FinancialProjection,
        roof: &RoofRecord,
        system_size_kw: f64,
        location: &LocationSummary,
    ) -> Narrative {
        Narrative {
            text: self.template(projection, roof, system_size_kw, location),
            used_inference: false,
        }
    }

    /// Deterministic summary from the computed numbers
    pub fn template(
        &self,
        projection: &FinancialProjection,
        roof: &RoofRecord,
        system_size_kw: f64,
        location: &LocationSummary,
    ) -> String {
        let currency = &self.region.currency;
        let place = if location.address.trim().is_empty() {
            "this property".to_string()
        } else {
            location.address.trim().to_string()
        };

        let mut text = format!(
            "A {size:.1} kW solar system on the roof at {place} would cost about \
             {cost:.0} {currency} to install and save roughly {savings:.0} {currency} \
             in its first year, paying for itself in about {payback:.1} years.",
            size = system_size_kw,
            cost = projection.installed_cost,
            savings = projection.annual_savings,
            payback = projection.payback_years,
        );

        text.push_str(&format!(
            " Over 25 years the savings add up to about {cumulative:.0} {currency}, \
             while avoiding {co2:.0} kg of CO2 each year, the equivalent of {trees} trees.",
            cumulative = projection.cumulative_savings_25y,
            co2 = projection.co2_offset_kg_per_year,
            trees = projection.tree_equivalent,
        ));

        if let Some(note) = self.roof_note(roof) {
            text.push(' ');
            text.push_str(note);
        }
        text
    }

    fn roof_note(&self, roof: &RoofRecord) -> Option<&'static str> {
        if roof.shading == Shading::High {
            Some("Heavy shading limits output, so trimming nearby trees would pay off quickly.")
        } else if roof.orientation == Orientation::North {
            Some("The north-facing roof reduces yield compared with a south-facing one.")
        } else if needs_tilt_brackets(roof, &self.region) {
            Some("Tilt brackets could bring the panels closer to the ideal angle.")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImagePayload, ProviderError};
    use async_trait::async_trait;
    use sunplan_common::models::{
        Complexity, Coordinates, DataOrigin, LocationIrradiance,
    };

    struct FixedText(Result<String, ProviderError>);

    #[async_trait]
    impl VisionProvider for FixedText {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify_image(
            &self,
            _model: &str,
            _image: &ImagePayload,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            Err(ProviderError::Network("unused".into()))
        }

        async fn extract_structured_analysis(
            &self,
            _model: &str,
            _image: &ImagePayload,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            Err(ProviderError::Network("unused".into()))
        }

        async fn generate_text(&self, _model: &str, _prompt: &str) -> Result<String, ProviderError> {
            self.0.clone()
        }
    }

    fn projection() -> FinancialProjection {
        FinancialProjection {
            installed_cost: 7920.0,
            annual_savings: 1250.0,
            monthly_savings: 104.2,
            payback_years: 6.3,
            cumulative_savings_25y: 38000.0,
            roi_pct: 380.0,
            co2_offset_kg_per_year: 3200.0,
            co2_offset_kg_lifetime: 75000.0,
            tree_equivalent: 152,
        }
    }

    fn roof(shading: Shading) -> RoofRecord {
        RoofRecord {
            area_m2: 100.0,
            usable_area_pct: 70.0,
            shading,
            pitch_deg: 36.0,
            complexity: Complexity::Simple,
            orientation: Orientation::South,
            obstacles: vec![],
            estimated_panel_count: 18,
            optimal_tilt_deg: 36.0,
            confidence: 80,
        }
    }

    fn location() -> LocationSummary {
        LocationSummary {
            address: "12 Sunny Lane, Zagreb".to_string(),
            coordinates: Coordinates {
                latitude: 45.8,
                longitude: 15.97,
            },
            used_real_geocoding: false,
            irradiance: LocationIrradiance {
                peak_sun_hours: 3.9,
                pv_potential_kwh_per_kwp: 1175.0,
                origin: DataOrigin::RegionDefault,
            },
        }
    }

    async fn run(summarizer: &NarrativeSummarizer, shading: Shading) -> (Narrative, AttemptLog) {
        let mut log = AttemptLog::new();
        let narrative = summarizer
            .summarize(
                &projection(),
                &roof(shading),
                7.2,
                &location(),
                &mut log,
                &CancellationToken::new(),
            )
            .await;
        (narrative, log)
    }

    #[tokio::test]
    async fn test_provider_text_used() {
        let summarizer = NarrativeSummarizer::new(
            Arc::new(FixedText(Ok("  Solar pays off here.  ".into()))),
            "text-model",
            Duration::from_secs(5),
            RegionProfile::default(),
        );
        let (narrative, log) = run(&summarizer, Shading::Low).await;
        assert!(narrative.used_inference);
        assert_eq!(narrative.text, "Solar pays off here.");
        assert_eq!(log.count(AttemptStage::Narrative), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back() {
        let summarizer = NarrativeSummarizer::new(
            Arc::new(FixedText(Ok("   ".into()))),
            "text-model",
            Duration::from_secs(5),
            RegionProfile::default(),
        );
        let (narrative, _) = run(&summarizer, Shading::Low).await;
        assert!(!narrative.used_inference);
        assert!(narrative.text.contains("7.2 kW"));
        assert!(narrative.text.contains("7920"));
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let summarizer = NarrativeSummarizer::new(
            Arc::new(FixedText(Err(ProviderError::RateLimited("busy".into())))),
            "text-model",
            Duration::from_secs(5),
            RegionProfile::default(),
        );
        let (narrative, log) = run(&summarizer, Shading::High).await;
        assert!(!narrative.used_inference);
        assert!(narrative.text.contains("trimming"));
        assert_eq!(log.count(AttemptStage::Narrative), 1);
    }

    #[test]
    fn test_template_never_empty_without_address() {
        let summarizer = NarrativeSummarizer::template_only(RegionProfile::default());
        let mut location = location();
        location.address = String::new();
        let text = summarizer.template(&projection(), &roof(Shading::Low), 7.2, &location);
        assert!(text.contains("this property"));
        assert!(text.contains("152 trees"));
    }

    #[tokio::test]
    async fn test_fallback_is_reproducible() {
        let summarizer = NarrativeSummarizer::new(
            Arc::new(FixedText(Err(ProviderError::Timeout(Duration::from_secs(15))))),
            "text-model",
            Duration::from_secs(5),
            RegionProfile::default(),
        );
        let (first, _) = run(&summarizer, Shading::Medium).await;
        let (second, _) = run(&summarizer, Shading::Medium).await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_tilt_note_matches_bracket_suggestion() {
        let summarizer = NarrativeSummarizer::template_only(RegionProfile::default());
        let mut slight = roof(Shading::Low);
        slight.pitch_deg = 44.0;
        let text = summarizer.template(&projection(), &slight, 7.2, &location());
        assert!(!text.contains("Tilt brackets"));

        let mut steep = roof(Shading::Low);
        steep.pitch_deg = 50.0;
        let text = summarizer.template(&projection(), &steep, 7.2, &location());
        assert!(text.contains("Tilt brackets"));
    }
}
