//! Roof Sanitizer
//!
//! Converts an untyped provider payload into a bounded `RoofRecord` or
//! `ExistingInstallationRecord`, or into a business rejection.
//!
//! # Check order
//! 1. Payload must be a JSON object (else `Malformed`, retried)
//! 2. `is_rooftop == false` → `InvalidImage`
//! 3. Declared `confidence` and `roof_area_m2` must be present (else `Malformed`)
//! 4. Declared confidence below the floor → `LowConfidence`
//! 5. New installation with panels present → `ExistingPanelsDetected`
//! 6. Existing installation without panels → `NoPanelsDetected`
//! 7. Every field clamped into its band; each field that had to be
//!    defaulted costs 5 confidence points
//! 8. Existing installation: panel density cross-check (-20 confidence,
//!    count truncated)
//! 9. Final confidence below the advisory threshold → advisory suggestion
//!
//! Rejections (2, 4-6) are decided from a well-formed answer and are never
//! retried; `Malformed` is an attempt failure.

use super::payload::{extract_json_object, FieldReader};
use crate::error::AnalysisError;
use serde_json::{Map, Value};
use std::str::FromStr;
use sunplan_common::models::{
    AnalysisMode, Complexity, ExistingInstallationRecord, Orientation, PanelCondition, Priority,
    RoofFindings, RoofRecord, Shading, Suggestion, SuggestionCategory,
};
use thiserror::Error;
use tracing::debug;

/// Confidence points lost per field that had to be defaulted
const DEFAULTED_FIELD_PENALTY: u8 = 5;

/// Confidence points lost when the mounted panel count exceeds physical density
const DENSITY_PENALTY: u8 = 20;

/// Obstacles kept from one payload
const MAX_OBSTACLES: usize = 20;

/// Improvements kept from one payload
const MAX_IMPROVEMENTS: usize = 10;

/// Why a payload did not become a record
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SanitizeError {
    /// Payload unusable; the attempt failed and may be retried
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Well-formed answer that rejects the analysis
    #[error(transparent)]
    Rejected(AnalysisError),
}

/// Sanitized analysis plus advisories to show before the engine's suggestions
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedAnalysis {
    pub findings: RoofFindings,
    pub advisories: Vec<Suggestion>,
}

impl SanitizedAnalysis {
    pub fn confidence(&self) -> u8 {
        self.findings.roof().confidence
    }
}

/// Sanitizer for structured analysis payloads
#[derive(Debug, Clone, Copy)]
pub struct RoofSanitizer {
    confidence_floor: u8,
    advisory_below: u8,
}

impl RoofSanitizer {
    pub fn new(confidence_floor: u8, advisory_below: u8) -> Self {
        Self {
            confidence_floor,
            advisory_below,
        }
    }

    /// Parse a raw provider reply
    pub fn sanitize_reply(
        &self,
        mode: AnalysisMode,
        reply: &str,
    ) -> Result<SanitizedAnalysis, SanitizeError> {
        let map = extract_json_object(reply).ok_or_else(|| {
            SanitizeError::Malformed("reply does not contain a JSON object".to_string())
        })?;
        self.sanitize(mode, &map)
    }

    /// Sanitize an already located payload object
    pub fn sanitize(
        &self,
        mode: AnalysisMode,
        map: &Map<String, Value>,
    ) -> Result<SanitizedAnalysis, SanitizeError> {
        let reader = FieldReader::new(map);

        if reader.boolean(&["is_rooftop", "is_roof"]) == Some(false) {
            let reason = reader
                .string(&["reason", "rejection_reason"])
                .unwrap_or("no rooftop visible");
            return Err(SanitizeError::Rejected(AnalysisError::InvalidImage(
                reason.to_string(),
            )));
        }

        let declared_confidence = reader
            .number(&["confidence"])
            .ok_or_else(|| SanitizeError::Malformed("missing confidence".to_string()))?;
        if !reader.has(&["roof_area_m2", "roof_area", "area_m2"]) {
            return Err(SanitizeError::Malformed("missing roof_area_m2".to_string()));
        }

        let declared_confidence = clamp_confidence(declared_confidence);
        if declared_confidence < self.confidence_floor {
            return Err(SanitizeError::Rejected(AnalysisError::LowConfidence {
                confidence: declared_confidence,
                floor: self.confidence_floor,
            }));
        }

        let mounted_panels = reader
            .number(&["current_panel_count", "existing_panel_count"])
            .map(clamp_count)
            .unwrap_or(0);

        match mode {
            AnalysisMode::NewInstallation => {
                let has_panels = reader.boolean(&["has_existing_panels"]).unwrap_or(false);
                if has_panels || mounted_panels > 0 {
                    return Err(SanitizeError::Rejected(
                        AnalysisError::ExistingPanelsDetected,
                    ));
                }
            }
            AnalysisMode::ExistingInstallation => {
                if mounted_panels == 0 {
                    return Err(SanitizeError::Rejected(AnalysisError::NoPanelsDetected));
                }
            }
        }

        let mut defaulted = 0u8;
        let mut roof = read_roof(&reader, declared_confidence, &mut defaulted);

        let findings = match mode {
            AnalysisMode::NewInstallation => {
                roof.confidence = penalize(
                    roof.confidence,
                    defaulted.saturating_mul(DEFAULTED_FIELD_PENALTY),
                );
                RoofFindings::NewInstallation(roof)
            }
            AnalysisMode::ExistingInstallation => {
                let record = read_installation(&reader, roof, mounted_panels, &mut defaulted);
                RoofFindings::ExistingInstallation(record)
            }
        };

        let confidence = findings.roof().confidence;
        let mut advisories = Vec::new();
        if confidence < self.advisory_below {
            advisories.push(low_confidence_advisory(confidence));
        }

        debug!(
            mode = mode.as_str(),
            declared_confidence = declared_confidence,
            confidence = confidence,
            defaulted_fields = defaulted,
            "Analysis payload sanitized"
        );

        Ok(SanitizedAnalysis {
            findings,
            advisories,
        })
    }
}

fn read_roof(reader: &FieldReader<'_>, confidence: u8, defaulted: &mut u8) -> RoofRecord {
    let mut number_or = |keys: &[&str], default: f64, band: (f64, f64)| match reader.number(keys)
    {
        Some(value) => clamp_band(value, band),
        None => {
            *defaulted += 1;
            default
        }
    };

    let area_m2 = number_or(
        &["roof_area_m2", "roof_area", "area_m2"],
        RoofRecord::AREA_M2.0,
        RoofRecord::AREA_M2,
    );
    let usable_area_pct = number_or(
        &["usable_area_pct", "usable_area_percentage", "usable_pct"],
        55.0,
        RoofRecord::USABLE_AREA_PCT,
    );
    let pitch_deg = number_or(&["pitch_deg", "roof_pitch", "pitch"], 30.0, RoofRecord::PITCH_DEG);
    let optimal_tilt_deg = number_or(
        &["optimal_tilt_deg", "optimal_tilt"],
        clamp_band(pitch_deg, RoofRecord::OPTIMAL_TILT_DEG),
        RoofRecord::OPTIMAL_TILT_DEG,
    );
    let panel_band = (
        RoofRecord::PANEL_COUNT.0 as f64,
        RoofRecord::PANEL_COUNT.1 as f64,
    );
    let estimated_panel_count = number_or(
        &["estimated_panel_count", "panel_count"],
        panel_band.0,
        panel_band,
    )
    .floor() as u32;

    let shading = parse_label(reader, &["shading", "shading_level"], Shading::Medium, defaulted);
    let complexity = parse_label(
        reader,
        &["complexity", "roof_complexity"],
        Complexity::Moderate,
        defaulted,
    );
    let orientation = parse_label(
        reader,
        &["orientation", "roof_orientation"],
        Orientation::East,
        defaulted,
    );

    let mut obstacles = reader.string_list(&["obstacles"]);
    obstacles.truncate(MAX_OBSTACLES);

    RoofRecord {
        area_m2,
        usable_area_pct,
        shading,
        pitch_deg,
        complexity,
        orientation,
        obstacles,
        estimated_panel_count,
        optimal_tilt_deg,
        confidence,
    }
}

fn read_installation(
    reader: &FieldReader<'_>,
    mut roof: RoofRecord,
    mounted_panels: u32,
    defaulted: &mut u8,
) -> ExistingInstallationRecord {
    let current_efficiency_pct = match reader.number(&["current_efficiency_pct", "current_efficiency"]) {
        Some(value) => clamp_band(value, (0.0, 100.0)),
        None => {
            *defaulted += 1;
            75.0
        }
    };
    let potential_efficiency_pct = match reader
        .number(&["potential_efficiency_pct", "potential_efficiency"])
    {
        Some(value) => clamp_band(value, (current_efficiency_pct, 100.0)),
        None => {
            *defaulted += 1;
            current_efficiency_pct
        }
    };
    let panel_condition = parse_label(
        reader,
        &["panel_condition", "condition"],
        PanelCondition::Fair,
        defaulted,
    );

    let mut penalty = defaulted.saturating_mul(DEFAULTED_FIELD_PENALTY);
    let max_panels = (roof.area_m2 * ExistingInstallationRecord::MAX_PANEL_DENSITY_PER_M2).floor() as u32;
    let current_panel_count = if mounted_panels > max_panels {
        debug!(
            reported = mounted_panels,
            max_panels = max_panels,
            area_m2 = roof.area_m2,
            "Mounted panel count exceeds physical density, truncating"
        );
        penalty = penalty.saturating_add(DENSITY_PENALTY);
        max_panels
    } else {
        mounted_panels
    };
    roof.confidence = penalize(roof.confidence, penalty);

    let mut improvements: Vec<Suggestion> = reader
        .objects(&["improvements", "suggestions"])
        .into_iter()
        .filter_map(read_improvement)
        .take(MAX_IMPROVEMENTS)
        .collect();
    // Stable: equal priorities keep provider order
    improvements.sort_by_key(|s| s.priority);

    ExistingInstallationRecord {
        roof,
        current_panel_count,
        current_efficiency_pct,
        potential_efficiency_pct,
        panel_condition,
        improvements,
    }
}

fn read_improvement(map: &Map<String, Value>) -> Option<Suggestion> {
    let reader = FieldReader::new(map);
    let title = reader.string(&["title", "name"])?;
    let description = reader.string(&["description", "details"]).unwrap_or("");
    let category = reader
        .string(&["category", "type"])
        .and_then(|s| SuggestionCategory::from_str(s).ok())
        .unwrap_or(SuggestionCategory::Other);
    let priority = reader
        .string(&["priority"])
        .and_then(|s| Priority::from_str(s).ok())
        .unwrap_or(Priority::Medium);

    let mut suggestion = Suggestion::new(category, title, description, priority);
    if let Some(gain) = reader.number(&["estimated_gain_pct", "gain_pct"]).filter(|g| *g >= 0.0) {
        suggestion = suggestion.with_gain(gain.min(100.0));
    }
    if let Some(cost) = reader.number(&["estimated_cost", "cost"]).filter(|c| *c >= 0.0) {
        suggestion = suggestion.with_cost(cost);
    }
    Some(suggestion)
}

fn parse_label<T: FromStr>(
    reader: &FieldReader<'_>,
    keys: &[&str],
    default: T,
    defaulted: &mut u8,
) -> T {
    match reader.string(keys).and_then(|s| s.parse::<T>().ok()) {
        Some(value) => value,
        None => {
            *defaulted += 1;
            default
        }
    }
}

fn low_confidence_advisory(confidence: u8) -> Suggestion {
    Suggestion::new(
        SuggestionCategory::Advisory,
        "Low-confidence assessment",
        format!(
            "The roof could only be assessed with {}% confidence. Treat the figures as a rough estimate and confirm them with an on-site survey.",
            confidence
        ),
        Priority::High,
    )
}

fn clamp_band(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

fn clamp_confidence(value: f64) -> u8 {
    clamp_band(value, (0.0, 100.0)).round() as u8
}

fn clamp_count(value: f64) -> u32 {
    clamp_band(value, (0.0, u32::MAX as f64)).floor() as u32
}

fn penalize(confidence: u8, penalty: u8) -> u8 {
    confidence.saturating_sub(penalty)
}
