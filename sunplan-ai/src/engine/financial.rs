//! Installed cost, savings and 25-year projection
//!
//! Yearly savings compound panel degradation `d` and electricity price
//! escalation `r`: year `y` (0-based) saves `S·(1−d)^y·(1+r)^y`.

use serde::{Deserialize, Serialize};
use sunplan_common::config::RegionProfile;
use sunplan_common::models::{FinancialProjection, SystemSpecs};
use tracing::warn;

/// Projection horizon in years
pub const PROJECTION_YEARS: u32 = 25;

/// Payback reported for systems whose savings never recover the cost
pub const MAX_PAYBACK_YEARS: f64 = 99.0;

/// Panel product line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelTier {
    #[default]
    Standard,
    Premium,
}

impl PanelTier {
    pub fn cost_multiplier(&self) -> f64 {
        match self {
            PanelTier::Standard => 1.0,
            PanelTier::Premium => 1.25,
        }
    }
}

/// Roof covering, drives mounting labour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoofMaterial {
    #[default]
    Asphalt,
    Metal,
    Tile,
    Slate,
}

impl RoofMaterial {
    pub fn cost_multiplier(&self) -> f64 {
        match self {
            RoofMaterial::Asphalt => 1.0,
            RoofMaterial::Metal => 1.05,
            RoofMaterial::Tile => 1.15,
            RoofMaterial::Slate => 1.25,
        }
    }
}

/// Installed-cost adjustments chosen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostOptions {
    #[serde(default)]
    pub panel_tier: PanelTier,
    #[serde(default)]
    pub roof_material: RoofMaterial,
}

/// A monthly bill that can cap savings; non-positive or non-finite bills are ignored
pub fn usable_monthly_bill(monthly_bill: Option<f64>) -> Option<f64> {
    match monthly_bill {
        Some(bill) if bill.is_finite() && bill > 0.0 => Some(bill),
        Some(bill) => {
            warn!(monthly_bill = bill, "Ignoring non-positive monthly bill");
            None
        }
        None => None,
    }
}

/// Σ_{y=0..years-1} first_year · ((1−d)(1+r))^y, summed year by year
pub fn cumulative_savings(first_year: f64, degradation: f64, escalation: f64, years: u32) -> f64 {
    let yearly_factor = (1.0 - degradation) * (1.0 + escalation);
    let mut total = 0.0;
    let mut current = first_year;
    for _ in 0..years {
        total += current;
        current *= yearly_factor;
    }
    total
}

/// Financial projection for computed system specs
pub fn project(
    specs: &SystemSpecs,
    region: &RegionProfile,
    monthly_bill: Option<f64>,
    options: &CostOptions,
) -> FinancialProjection {
    let installed_cost = specs.system_size_kw
        * 1000.0
        * region.cost_per_watt
        * options.panel_tier.cost_multiplier()
        * options.roof_material.cost_multiplier();

    let energy_value = specs.annual_production_kwh * region.electricity_rate;
    let annual_savings = match usable_monthly_bill(monthly_bill) {
        Some(bill) => energy_value.min(12.0 * bill),
        None => energy_value,
    }
    .max(0.0);
    let monthly_savings = annual_savings / 12.0;

    let payback_years = if annual_savings > 0.0 {
        (installed_cost / annual_savings).min(MAX_PAYBACK_YEARS)
    } else {
        MAX_PAYBACK_YEARS
    };

    let cumulative_savings_25y = cumulative_savings(
        annual_savings,
        region.degradation_rate,
        region.rate_escalation,
        PROJECTION_YEARS,
    );
    let roi_pct = if installed_cost > 0.0 {
        (cumulative_savings_25y - installed_cost) / installed_cost * 100.0
    } else {
        0.0
    };

    let co2_offset_kg_per_year = specs.annual_production_kwh * region.grid_emission_kg_per_kwh;
    // Lifetime offset follows degraded production only; grid prices do not matter here
    let co2_offset_kg_lifetime = cumulative_savings(
        co2_offset_kg_per_year,
        region.degradation_rate,
        0.0,
        PROJECTION_YEARS,
    );
    let tree_equivalent = (co2_offset_kg_per_year / region.tree_absorption_kg_per_year)
        .round()
        .max(0.0) as u32;

    FinancialProjection {
        installed_cost,
        annual_savings,
        monthly_savings,
        payback_years,
        cumulative_savings_25y,
        roi_pct,
        co2_offset_kg_per_year,
        co2_offset_kg_lifetime,
        tree_equivalent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(size_kw: f64, production: f64) -> SystemSpecs {
        SystemSpecs {
            panel_count: (size_kw / 0.4).round() as u32,
            system_size_kw: size_kw,
            roof_area_used_m2: 50.0,
            annual_production_kwh: production,
        }
    }

    #[test]
    fn test_cumulative_without_drift_is_linear() {
        assert!((cumulative_savings(1000.0, 0.0, 0.0, 25) - 25_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_cumulative_matches_closed_form() {
        let (s, d, r) = (1200.0, 0.005, 0.03);
        let q: f64 = (1.0 - d) * (1.0 + r);
        let closed = s * (1.0 - q.powi(25)) / (1.0 - q);
        assert!((cumulative_savings(s, d, r, 25) - closed).abs() < 1e-9 * closed);
    }

    #[test]
    fn test_savings_capped_by_bill() {
        let region = RegionProfile::default();
        let projection = project(
            &specs(7.2, 8400.0),
            &region,
            Some(50.0),
            &CostOptions::default(),
        );
        assert!((projection.annual_savings - 600.0).abs() < 1e-9);
        assert!((projection.monthly_savings - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_bill_ignored() {
        let region = RegionProfile::default();
        let uncapped = project(&specs(7.2, 8400.0), &region, None, &CostOptions::default());
        for bill in [0.0, -30.0, f64::NAN] {
            let projection = project(&specs(7.2, 8400.0), &region, Some(bill), &CostOptions::default());
            assert_eq!(projection.annual_savings, uncapped.annual_savings);
        }
    }

    #[test]
    fn test_cost_multipliers() {
        let region = RegionProfile::default();
        let base = project(&specs(4.0, 4000.0), &region, None, &CostOptions::default());
        let premium_slate = project(
            &specs(4.0, 4000.0),
            &region,
            None,
            &CostOptions {
                panel_tier: PanelTier::Premium,
                roof_material: RoofMaterial::Slate,
            },
        );
        assert!((base.installed_cost - 4400.0).abs() < 1e-6);
        assert!((premium_slate.installed_cost - 4400.0 * 1.25 * 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_environmental_figures() {
        let region = RegionProfile::default();
        let projection = project(&specs(4.0, 1000.0), &region, None, &CostOptions::default());
        assert!((projection.co2_offset_kg_per_year - 450.0).abs() < 1e-9);
        assert_eq!(projection.tree_equivalent, 21);
        assert!(projection.co2_offset_kg_lifetime < 450.0 * 25.0);
        assert!(projection.co2_offset_kg_lifetime > 450.0 * 23.0);
    }

    #[test]
    fn test_cost_options_deserialize_with_defaults() {
        let options: CostOptions = serde_json::from_str(r#"{"roof_material": "tile"}"#).unwrap();
        assert_eq!(options.panel_tier, PanelTier::Standard);
        assert_eq!(options.roof_material, RoofMaterial::Tile);
    }
}
