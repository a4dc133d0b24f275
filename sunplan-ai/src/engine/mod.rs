//! Recommendation Engine
//!
//! Pure, deterministic sizing: a sanitized roof record plus location
//! irradiance in, system specs, 25-year financials, suggestions and a
//! suitability score out. No I/O.
//!
//! # Modules
//! 1. **sizing** - panel tiers, system size, production
//! 2. **financial** - installed cost, savings, amortization, CO₂
//! 3. **suitability** - 0-100 score with rating
//! 4. **suggestions** - rule-based improvements
//!
//! Outputs are checked against the region's plausibility band before they
//! leave the engine. A violation is a defect, reported as
//! `EngineError::InvariantViolation` and never emitted as a result.

pub mod financial;
pub mod sizing;
pub mod suggestions;
pub mod suitability;

pub use financial::{CostOptions, PanelTier, RoofMaterial};

use crate::error::AnalysisError;
use sunplan_common::config::RegionProfile;
use sunplan_common::models::{
    Complexity, FinancialProjection, LocationIrradiance, Orientation, Recommendation, RoofRecord,
    Shading, SystemSpecs,
};
use thiserror::Error;
use tracing::error;

/// Engine failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<EngineError> for AnalysisError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvariantViolation(msg) => AnalysisError::EngineInvariantViolation(msg),
        }
    }
}

/// Recommendation engine bound to one region profile
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    region: RegionProfile,
}

impl RecommendationEngine {
    pub fn new(region: RegionProfile) -> Self {
        Self { region }
    }

    pub fn region(&self) -> &RegionProfile {
        &self.region
    }

    /// Size a system with standard panels on an asphalt roof
    pub fn size(
        &self,
        roof: &RoofRecord,
        irradiance: &LocationIrradiance,
        monthly_bill: Option<f64>,
    ) -> Result<Recommendation, EngineError> {
        self.size_with(roof, irradiance, monthly_bill, &CostOptions::default())
    }

    /// Size a system with explicit cost adjustments
    pub fn size_with(
        &self,
        roof: &RoofRecord,
        irradiance: &LocationIrradiance,
        monthly_bill: Option<f64>,
        options: &CostOptions,
    ) -> Result<Recommendation, EngineError> {
        if !roof.is_within_bounds() {
            return Err(self.violation(format!(
                "roof record outside sanitized bands: {:?}",
                roof
            )));
        }
        if !(irradiance.pv_potential_kwh_per_kwp.is_finite()
            && irradiance.pv_potential_kwh_per_kwp > 0.0)
        {
            return Err(self.violation(format!(
                "non-positive PV potential {}",
                irradiance.pv_potential_kwh_per_kwp
            )));
        }

        let system_specs = sizing::compute_specs(roof, irradiance, &self.region);
        self.check_specs(&system_specs)?;

        let financial_projection =
            financial::project(&system_specs, &self.region, monthly_bill, options);
        self.check_financials(&financial_projection)?;

        let suggestions = suggestions::suggest(roof, &system_specs, &self.region);
        let suitability = suitability::score(roof, irradiance, &self.region);

        Ok(Recommendation {
            system_specs,
            financial_projection,
            suggestions,
            suitability,
        })
    }

    fn check_specs(&self, specs: &SystemSpecs) -> Result<(), EngineError> {
        let band = &self.region.plausibility;

        if specs.panel_count < band.min_panels || specs.panel_count > band.max_panels {
            return Err(self.violation(format!(
                "panel count {} outside {}-{}",
                specs.panel_count, band.min_panels, band.max_panels
            )));
        }

        let watt_kw = self.region.panel_wattage_w / 1000.0;
        let min_size = band.min_panels as f64 * watt_kw;
        let max_size = band.max_panels as f64 * watt_kw;
        if !specs.system_size_kw.is_finite()
            || specs.system_size_kw < min_size - 1e-9
            || specs.system_size_kw > max_size + 1e-9
        {
            return Err(self.violation(format!(
                "system size {:.2} kW outside {:.2}-{:.2} kW",
                specs.system_size_kw, min_size, max_size
            )));
        }

        let specific_yield = specs.annual_production_kwh / specs.system_size_kw;
        if !specific_yield.is_finite()
            || specific_yield < band.min_specific_yield
            || specific_yield > band.max_specific_yield
        {
            return Err(self.violation(format!(
                "specific yield {:.0} kWh/kW outside {:.0}-{:.0}",
                specific_yield, band.min_specific_yield, band.max_specific_yield
            )));
        }

        if !specs.roof_area_used_m2.is_finite() || specs.roof_area_used_m2 <= 0.0 {
            return Err(self.violation(format!(
                "roof area used {} is not positive",
                specs.roof_area_used_m2
            )));
        }

        Ok(())
    }

    fn check_financials(&self, projection: &FinancialProjection) -> Result<(), EngineError> {
        let non_negative = [
            ("installed_cost", projection.installed_cost),
            ("annual_savings", projection.annual_savings),
            ("monthly_savings", projection.monthly_savings),
            ("payback_years", projection.payback_years),
            ("cumulative_savings_25y", projection.cumulative_savings_25y),
            ("co2_offset_kg_per_year", projection.co2_offset_kg_per_year),
            ("co2_offset_kg_lifetime", projection.co2_offset_kg_lifetime),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(self.violation(format!("{} is {}", field, value)));
            }
        }
        if !projection.roi_pct.is_finite() {
            return Err(self.violation("roi_pct is not finite".to_string()));
        }
        Ok(())
    }

    fn violation(&self, detail: String) -> EngineError {
        error!(detail = %detail, "Recommendation engine invariant violated");
        EngineError::InvariantViolation(detail)
    }

    /// Conservative stand-in roof used when no provider could analyze the image
    ///
    /// Confidence is 0: every number derives from region defaults.
    pub fn conservative_roof(&self) -> RoofRecord {
        let pitch_deg = self
            .region
            .optimal_pitch_deg
            .clamp(RoofRecord::PITCH_DEG.0, RoofRecord::PITCH_DEG.1);
        RoofRecord {
            area_m2: 80.0,
            usable_area_pct: 55.0,
            shading: Shading::Medium,
            pitch_deg,
            complexity: Complexity::Moderate,
            orientation: Orientation::South,
            obstacles: Vec::new(),
            estimated_panel_count: sizing::panel_count(80.0 * 0.55),
            optimal_tilt_deg: pitch_deg.clamp(
                RoofRecord::OPTIMAL_TILT_DEG.0,
                RoofRecord::OPTIMAL_TILT_DEG.1,
            ),
            confidence: 0,
        }
    }
}
