//! Suitability scoring
//!
//! Starts at 100 and deducts penalties:
//! - Shading: low 0, medium 15, high 30
//! - Complexity: simple 0, moderate 10, complex 20
//! - Pitch: 0.75 per degree of deviation beyond 5°, at most 20
//!
//! Adds 5 when local peak sun hours beat the region average. The result is
//! clamped to 0-100 and rounded.

use sunplan_common::config::RegionProfile;
use sunplan_common::models::{Complexity, LocationIrradiance, RoofRecord, Shading, SuitabilityScore};

const PITCH_TOLERANCE_DEG: f64 = 5.0;
const PITCH_PENALTY_PER_DEG: f64 = 0.75;
const MAX_PITCH_PENALTY: f64 = 20.0;
const IRRADIANCE_BONUS: f64 = 5.0;

pub fn shading_penalty(shading: Shading) -> f64 {
    match shading {
        Shading::Low => 0.0,
        Shading::Medium => 15.0,
        Shading::High => 30.0,
    }
}

pub fn complexity_penalty(complexity: Complexity) -> f64 {
    match complexity {
        Complexity::Simple => 0.0,
        Complexity::Moderate => 10.0,
        Complexity::Complex => 20.0,
    }
}

pub fn pitch_penalty(pitch_deg: f64, optimal_pitch_deg: f64) -> f64 {
    let excess = (pitch_deg - optimal_pitch_deg).abs() - PITCH_TOLERANCE_DEG;
    if excess <= 0.0 {
        0.0
    } else {
        (excess * PITCH_PENALTY_PER_DEG).min(MAX_PITCH_PENALTY)
    }
}

pub fn score(
    roof: &RoofRecord,
    irradiance: &LocationIrradiance,
    region: &RegionProfile,
) -> SuitabilityScore {
    let mut score = 100.0
        - shading_penalty(roof.shading)
        - complexity_penalty(roof.complexity)
        - pitch_penalty(roof.pitch_deg, region.optimal_pitch_deg);

    if irradiance.peak_sun_hours > region.peak_sun_hours {
        score += IRRADIANCE_BONUS;
    }

    SuitabilityScore::new(score.clamp(0.0, 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunplan_common::models::{DataOrigin, Orientation, SuitabilityRating};

    fn roof(shading: Shading, complexity: Complexity, pitch_deg: f64) -> RoofRecord {
        RoofRecord {
            area_m2: 100.0,
            usable_area_pct: 70.0,
            shading,
            pitch_deg,
            complexity,
            orientation: Orientation::South,
            obstacles: vec![],
            estimated_panel_count: 18,
            optimal_tilt_deg: 36.0,
            confidence: 80,
        }
    }

    fn irradiance(peak_sun_hours: f64) -> LocationIrradiance {
        LocationIrradiance {
            peak_sun_hours,
            pv_potential_kwh_per_kwp: 1175.0,
            origin: DataOrigin::RegionDefault,
        }
    }

    #[test]
    fn test_ideal_roof_scores_100() {
        let region = RegionProfile::default();
        let result = score(
            &roof(Shading::Low, Complexity::Simple, 36.0),
            &irradiance(region.peak_sun_hours),
            &region,
        );
        assert_eq!(result.score, 100);
        assert_eq!(result.rating, SuitabilityRating::Excellent);
    }

    #[test]
    fn test_penalties_accumulate() {
        let region = RegionProfile::default();
        // 100 - 30 - 20 - 14.25 = 35.75
        let result = score(
            &roof(Shading::High, Complexity::Complex, 60.0),
            &irradiance(region.peak_sun_hours),
            &region,
        );
        assert_eq!(result.score, 36);
        assert_eq!(result.rating, SuitabilityRating::Poor);
    }

    #[test]
    fn test_bonus_never_exceeds_100() {
        let region = RegionProfile::default();
        let result = score(
            &roof(Shading::Low, Complexity::Simple, 36.0),
            &irradiance(region.peak_sun_hours + 1.0),
            &region,
        );
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_pitch_tolerance() {
        assert_eq!(pitch_penalty(40.0, 36.0), 0.0);
        assert_eq!(pitch_penalty(46.0, 36.0), 3.75);
        assert_eq!(pitch_penalty(5.0, 36.0), 19.5);
    }
}
