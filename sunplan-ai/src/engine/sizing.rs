//! Panel count, system size and annual production
//!
//! # Panel tiers
//! Panel count comes from a tier table keyed by usable roof area. Tiers are
//! contiguous and their panel ranges strictly increase, so the count never
//! decreases as usable area grows. Inside a tier the count interpolates
//! linearly over the tier's panel range.
//!
//! | usable m² | panels |
//! |-----------|--------|
//! | < 25      | 5-6    |
//! | 25-35     | 7-8    |
//! | 35-45     | 9-11   |
//! | 45-55     | 12-13  |
//! | 55-65     | 14-16  |
//! | 65-80     | 17-19  |
//! | 80-95     | 20-22  |
//! | 95-115    | 23-25  |
//! | 115-140   | 26-28  |
//! | ≥ 140     | 29-30  |
//!
//! # Production
//! `annual kWh = system kW × PV potential × tilt factor × temperature factor`

use sunplan_common::config::RegionProfile;
use sunplan_common::models::{LocationIrradiance, Orientation, RoofRecord, SystemSpecs};

/// One row of the tier table: usable area `[lower, upper)` → panels `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaTier {
    pub lower_m2: f64,
    pub upper_m2: f64,
    pub min_panels: u32,
    pub max_panels: u32,
}

const fn tier(lower_m2: f64, upper_m2: f64, min_panels: u32, max_panels: u32) -> AreaTier {
    AreaTier {
        lower_m2,
        upper_m2,
        min_panels,
        max_panels,
    }
}

/// Upper edge used to interpolate inside the open-ended last tier
/// (largest roof × largest usable share)
const LAST_TIER_SPAN_END_M2: f64 = 285.0;

pub const PANEL_TIERS: [AreaTier; 10] = [
    tier(0.0, 25.0, 5, 6),
    tier(25.0, 35.0, 7, 8),
    tier(35.0, 45.0, 9, 11),
    tier(45.0, 55.0, 12, 13),
    tier(55.0, 65.0, 14, 16),
    tier(65.0, 80.0, 17, 19),
    tier(80.0, 95.0, 20, 22),
    tier(95.0, 115.0, 23, 25),
    tier(115.0, 140.0, 26, 28),
    tier(140.0, f64::INFINITY, 29, 30),
];

/// Tier containing `usable_m2`
pub fn tier_for(usable_m2: f64) -> AreaTier {
    let usable_m2 = if usable_m2.is_finite() { usable_m2.max(0.0) } else { 0.0 };
    PANEL_TIERS
        .iter()
        .copied()
        .find(|t| usable_m2 < t.upper_m2)
        .unwrap_or(PANEL_TIERS[PANEL_TIERS.len() - 1])
}

/// Panel count for a usable area, monotone non-decreasing in area
pub fn panel_count(usable_m2: f64) -> u32 {
    let tier = tier_for(usable_m2);
    let usable_m2 = if usable_m2.is_finite() { usable_m2.max(0.0) } else { 0.0 };

    let upper = if tier.upper_m2.is_finite() {
        tier.upper_m2
    } else {
        LAST_TIER_SPAN_END_M2
    };
    let fraction = ((usable_m2 - tier.lower_m2) / (upper - tier.lower_m2)).clamp(0.0, 1.0);
    let steps = (tier.max_panels - tier.min_panels + 1) as f64;
    let offset = (fraction * steps).floor() as u32;

    (tier.min_panels + offset).min(tier.max_panels)
}

/// Degrees of pitch deviation treated as optimal for the south bonus
const SOUTH_BONUS_WINDOW_DEG: f64 = 3.0;
const SOUTH_BONUS: f64 = 1.02;
/// Production lost per degree of pitch deviation
const DEVIATION_LOSS_PER_DEG: f64 = 0.005;
const MIN_DEVIATION_FACTOR: f64 = 0.8;

/// Production multiplier for pitch and orientation
///
/// Flat roofs carry racked panels at the optimal tilt, so their pitch
/// deviation does not apply.
pub fn tilt_factor(pitch_deg: f64, optimal_pitch_deg: f64, orientation: Orientation) -> f64 {
    let orientation_factor = match orientation {
        Orientation::South => 1.0,
        Orientation::East | Orientation::West => 0.85,
        Orientation::North => 0.65,
        Orientation::Flat => return 0.9,
    };

    let deviation = (pitch_deg - optimal_pitch_deg).abs();
    let deviation_factor = (1.0 - DEVIATION_LOSS_PER_DEG * deviation).max(MIN_DEVIATION_FACTOR);

    let bonus = if orientation == Orientation::South && deviation <= SOUTH_BONUS_WINDOW_DEG {
        SOUTH_BONUS
    } else {
        1.0
    };

    orientation_factor * deviation_factor * bonus
}

/// System specs for a sanitized roof
pub fn compute_specs(
    roof: &RoofRecord,
    irradiance: &LocationIrradiance,
    region: &RegionProfile,
) -> SystemSpecs {
    let usable_m2 = roof.usable_area_m2();
    let panels = panel_count(usable_m2);
    let system_size_kw = panels as f64 * region.panel_wattage_w / 1000.0;
    let roof_area_used_m2 = (panels as f64 * region.effective_panel_footprint_m2).min(usable_m2);

    let annual_production_kwh = system_size_kw
        * irradiance.pv_potential_kwh_per_kwp
        * tilt_factor(roof.pitch_deg, region.optimal_pitch_deg, roof.orientation)
        * region.temperature_factor;

    SystemSpecs {
        panel_count: panels,
        system_size_kw,
        roof_area_used_m2,
        annual_production_kwh,
    }
}
