//! Recommendation engine outputs

use serde::{Deserialize, Serialize};

use super::roof::Suggestion;

/// Sized photovoltaic system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpecs {
    pub panel_count: u32,
    pub system_size_kw: f64,
    /// Roof area occupied by the array including setbacks, m²
    pub roof_area_used_m2: f64,
    pub annual_production_kwh: f64,
}

/// Cost, savings and environmental projection over the system lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialProjection {
    pub installed_cost: f64,
    /// First-year savings
    pub annual_savings: f64,
    pub monthly_savings: f64,
    /// Installed cost divided by first-year savings
    pub payback_years: f64,
    pub cumulative_savings_25y: f64,
    pub roi_pct: f64,
    pub co2_offset_kg_per_year: f64,
    pub co2_offset_kg_lifetime: f64,
    pub tree_equivalent: u32,
}

/// Coarse label derived from the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuitabilityRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// 0-100 rating of how favorable a roof is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuitabilityScore {
    pub score: u8,
    pub rating: SuitabilityRating,
}

impl SuitabilityScore {
    pub fn new(score: u8) -> Self {
        let score = score.min(100);
        let rating = match score {
            85..=100 => SuitabilityRating::Excellent,
            70..=84 => SuitabilityRating::Good,
            50..=69 => SuitabilityRating::Fair,
            _ => SuitabilityRating::Poor,
        };
        Self { score, rating }
    }
}

/// Full engine output for one roof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub system_specs: SystemSpecs,
    pub financial_projection: FinancialProjection,
    pub suggestions: Vec<Suggestion>,
    pub suitability: SuitabilityScore,
}
