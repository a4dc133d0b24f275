//! Outbound record returned to the caller on success

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::LocationSummary;
use super::recommendation::{FinancialProjection, SuitabilityScore, SystemSpecs};
use super::roof::{AnalysisMode, ExistingInstallationRecord, RoofRecord, Suggestion};

/// Roof facts in the shape matching the requested mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoofFindings {
    NewInstallation(RoofRecord),
    ExistingInstallation(ExistingInstallationRecord),
}

impl RoofFindings {
    /// Underlying roof record for either mode
    pub fn roof(&self) -> &RoofRecord {
        match self {
            RoofFindings::NewInstallation(roof) => roof,
            RoofFindings::ExistingInstallation(record) => &record.roof,
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        match self {
            RoofFindings::NewInstallation(_) => AnalysisMode::NewInstallation,
            RoofFindings::ExistingInstallation(_) => AnalysisMode::ExistingInstallation,
        }
    }
}

/// Successful analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub findings: RoofFindings,
    pub system_specs: SystemSpecs,
    pub financial_projection: FinancialProjection,
    pub suggestions: Vec<Suggestion>,
    pub suitability: SuitabilityScore,
    pub narrative_summary: String,
    /// Confidence of the roof analysis, 0-100
    pub confidence: u8,
    /// False whenever any stage substituted a deterministic default for inference
    pub used_inference: bool,
    /// Roof findings came from a provider rather than the regional estimate
    pub roof_used_inference: bool,
    /// Narrative came from a provider rather than the template
    pub narrative_used_inference: bool,
    pub location: LocationSummary,
}
