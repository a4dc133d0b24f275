//! Canned payloads and builders

use std::sync::Arc;
use sunplan_ai::engine::{CostOptions, RecommendationEngine};
use sunplan_ai::providers::ProviderEntry;
use sunplan_ai::services::{
    InferenceOrchestrator, NarrativeSummarizer, RegionDefaultGeocoder, RegionDefaultIrradiance,
};
use sunplan_ai::types::{ImageMime, ImagePayload};
use sunplan_ai::{AnalysisPipeline, AnalysisRequest};
use sunplan_common::config::{InferenceConfig, PipelineConfig, RegionProfile};
use sunplan_common::models::{Address, AnalysisMode};

pub const VALID: &str = r#"{"valid": true, "reason": "single clear roof"}"#;
pub const COLLAGE: &str = r#"{"valid": false, "reason": "collage"}"#;

/// Smallest byte string carrying a PNG signature
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 24]);
    bytes
}

pub fn png_image() -> ImagePayload {
    ImagePayload::new(png_bytes(), ImageMime::Png)
}

/// Roof matching the reference scenario
pub fn roof_json() -> String {
    r#"{"is_rooftop": true, "has_existing_panels": false, "roof_area_m2": 100,
        "usable_area_pct": 70, "shading": "low", "pitch_deg": 36,
        "complexity": "simple", "orientation": "south", "obstacles": ["chimney"],
        "estimated_panel_count": 18, "optimal_tilt_deg": 36, "confidence": 85}"#
        .to_string()
}

pub fn roof_json_with_confidence(confidence: u8) -> String {
    roof_json().replace("\"confidence\": 85", &format!("\"confidence\": {}", confidence))
}

pub fn roof_with_panels_json() -> String {
    roof_json().replace("\"has_existing_panels\": false", "\"has_existing_panels\": true")
}

pub fn installation_json(panel_count: u32) -> String {
    format!(
        r#"```json
{{"is_rooftop": true, "roof_area_m2": 120, "usable_area_pct": 65, "shading": "medium",
  "pitch_deg": 30, "complexity": "moderate", "orientation": "south", "obstacles": [],
  "estimated_panel_count": 20, "optimal_tilt_deg": 35, "current_panel_count": {},
  "current_efficiency_pct": 72, "potential_efficiency_pct": 88, "panel_condition": "fair",
  "improvements": [
    {{"category": "cleaning", "title": "Clean panels", "description": "Dust film",
      "priority": "low", "estimated_gain_pct": 4, "estimated_cost": 120}},
    {{"category": "repair", "title": "Replace cracked module", "description": "One cracked",
      "priority": "high", "estimated_cost": 350}}
  ],
  "confidence": 80}}
```"#,
        panel_count
    )
}

pub fn orchestrator(chain: Vec<ProviderEntry>) -> InferenceOrchestrator {
    InferenceOrchestrator::from_config(chain, &InferenceConfig::default(), &RegionProfile::default())
}

/// Pipeline with region-default location lookups
pub fn pipeline(chain: Vec<ProviderEntry>, settings: PipelineConfig) -> AnalysisPipeline {
    let region = RegionProfile::default();
    let inference = InferenceConfig::default();
    let summarizer = NarrativeSummarizer::from_chain(
        &chain,
        settings.narrative_inference,
        std::time::Duration::from_secs(inference.attempt_timeout_secs),
        region.clone(),
    );
    AnalysisPipeline::new(
        InferenceOrchestrator::from_config(chain, &inference, &region),
        RecommendationEngine::new(region.clone()),
        Arc::new(RegionDefaultGeocoder::new(&region)),
        Arc::new(RegionDefaultIrradiance::new(&region)),
        summarizer,
        settings,
    )
}

pub fn request(mode: AnalysisMode) -> AnalysisRequest {
    AnalysisRequest {
        image: png_bytes(),
        mime: "image/png".to_string(),
        address: Address {
            street: "12 Sunny Lane".to_string(),
            city: "Zagreb".to_string(),
            region: None,
            postal_code: None,
            country: "Croatia".to_string(),
        },
        mode,
        monthly_bill: None,
        cost_options: CostOptions::default(),
    }
}
