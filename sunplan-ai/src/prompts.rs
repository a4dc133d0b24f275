//! Prompt construction for the three provider calls
//!
//! Prompts embed the region constants so the provider estimates against the
//! same numbers the recommendation engine later uses.

use sunplan_common::config::RegionProfile;
use sunplan_common::models::{AnalysisMode, FinancialProjection, LocationSummary, RoofRecord};

/// Strict binary classification prompt for the image validator
pub fn validation_prompt() -> String {
    r#"You are a strict image gatekeeper for a rooftop solar assessment service.
Decide whether this image can be used to assess a building roof.

Answer INVALID if ANY of these hold:
1. The image is a collage, grid, split screen or composite of several photos.
2. The main subject is not a building (people, animals, vehicles, landscapes, food, objects).
3. The image is a diagram, drawing, floor plan, screenshot, map or document.
4. No single building is dominant, or the roof is not visible at all.
5. The photo is too dark, blurred or low resolution to make out the roof.

Answer VALID only for a single clear photograph (aerial, drone or street level)
in which one building's roof is plainly visible.

Reply with exactly one JSON object and nothing else:
{"valid": true, "reason": "short reason"}
or
{"valid": false, "reason": "short reason, e.g. collage"}"#
        .to_string()
}

/// Structured extraction prompt for the requested analysis mode
pub fn extraction_prompt(mode: AnalysisMode, region: &RegionProfile) -> String {
    let (area_lo, area_hi) = RoofRecord::AREA_M2;
    let (usable_lo, usable_hi) = RoofRecord::USABLE_AREA_PCT;
    let (pitch_lo, pitch_hi) = RoofRecord::PITCH_DEG;
    let (panels_lo, panels_hi) = RoofRecord::PANEL_COUNT;

    let context = format!(
        r#"You are an experienced residential solar surveyor working in the {region} region.

Region reference values:
- Typical peak sun hours: {psh:.1} h/day
- Typical PV potential: {pv:.0} kWh per installed kWp per year
- Optimal panel tilt: about {tilt:.0} degrees, facing south
- Electricity price: {rate:.2} {currency}/kWh
- Standard panel: {watt:.0} W, {panel_area:.2} m²
- Residential roofs: {area_lo:.0}-{area_hi:.0} m² total, {panels_lo}-{panels_hi} panels

Estimation rules:
- Be conservative. When uncertain, round the roof area DOWN.
- Usable area is typically 55-75% of the roof, not 85-95%. Subtract chimneys,
  vents, skylights, edges and setbacks.
- Pitch must be within {pitch_lo:.0}-{pitch_hi:.0} degrees.
- Usable area percentage must be within {usable_lo:.0}-{usable_hi:.0}.
- Give a confidence from 0 to 100 reflecting how clearly the roof is visible.
"#,
        region = region.name,
        psh = region.peak_sun_hours,
        pv = region.pv_potential_kwh_per_kwp,
        tilt = region.optimal_pitch_deg,
        rate = region.electricity_rate,
        currency = region.currency,
        watt = region.panel_wattage_w,
        panel_area = region.panel_area_m2,
    );

    let schema = match mode {
        AnalysisMode::NewInstallation => NEW_INSTALLATION_SCHEMA,
        AnalysisMode::ExistingInstallation => EXISTING_INSTALLATION_SCHEMA,
    };

    format!("{}\n{}", context, schema)
}

const NEW_INSTALLATION_SCHEMA: &str = r#"Task: assess this roof for a NEW solar installation.
If solar panels are already mounted on the roof, set "has_existing_panels" to true.

Return ONLY a JSON object with exactly these fields:
{
  "is_rooftop": true,
  "has_existing_panels": false,
  "roof_area_m2": 120,
  "usable_area_pct": 65,
  "shading": "low | medium | high",
  "pitch_deg": 35,
  "complexity": "simple | moderate | complex",
  "orientation": "north | south | east | west | flat",
  "obstacles": ["chimney", "skylight"],
  "estimated_panel_count": 18,
  "optimal_tilt_deg": 35,
  "confidence": 80
}"#;

const EXISTING_INSTALLATION_SCHEMA: &str = r#"Task: assess the solar panels ALREADY MOUNTED on this roof.
Count only panels you can actually see. If there are none, set "current_panel_count" to 0.

Return ONLY a JSON object with exactly these fields:
{
  "is_rooftop": true,
  "roof_area_m2": 120,
  "usable_area_pct": 65,
  "shading": "low | medium | high",
  "pitch_deg": 35,
  "complexity": "simple | moderate | complex",
  "orientation": "north | south | east | west | flat",
  "obstacles": ["chimney"],
  "estimated_panel_count": 18,
  "optimal_tilt_deg": 35,
  "current_panel_count": 14,
  "current_efficiency_pct": 78,
  "potential_efficiency_pct": 90,
  "panel_condition": "excellent | good | fair | poor",
  "improvements": [
    {"category": "cleaning", "title": "Clean panels", "description": "...", "priority": "high | medium | low", "estimated_gain_pct": 5, "estimated_cost": 150}
  ],
  "confidence": 80
}"#;

/// Narrative prompt built only from already computed numbers
pub fn narrative_prompt(
    projection: &FinancialProjection,
    roof: &RoofRecord,
    system_size_kw: f64,
    location: &LocationSummary,
    currency: &str,
) -> String {
    format!(
        r#"Write a short, persuasive but strictly factual paragraph (3-4 sentences, no lists,
no headings) for a homeowner about installing rooftop solar. Use ONLY the numbers below;
do not compute or invent any other figures.

Location: {address}
Roof: {area:.0} m², {usable:.0}% usable, {orientation} facing, {shading} shading
System size: {size:.1} kW
Installed cost: {cost:.0} {currency}
Annual savings: {savings:.0} {currency}
Payback: {payback:.1} years
25-year savings: {cumulative:.0} {currency}
CO2 avoided: {co2:.0} kg per year (about {trees} trees)"#,
        address = location.address,
        area = roof.area_m2,
        usable = roof.usable_area_pct,
        orientation = roof.orientation,
        shading = roof.shading,
        size = system_size_kw,
        cost = projection.installed_cost,
        savings = projection.annual_savings,
        payback = projection.payback_years,
        cumulative = projection.cumulative_savings_25y,
        co2 = projection.co2_offset_kg_per_year,
        trees = projection.tree_equivalent,
        currency = currency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_embeds_region_constants() {
        let region = RegionProfile::default();
        let prompt = extraction_prompt(AnalysisMode::NewInstallation, &region);
        assert!(prompt.contains("1175 kWh"));
        assert!(prompt.contains("round the roof area DOWN"));
        assert!(prompt.contains("has_existing_panels"));
        assert!(!prompt.contains("current_panel_count"));
    }

    #[test]
    fn test_existing_prompt_asks_for_panel_count() {
        let prompt = extraction_prompt(
            AnalysisMode::ExistingInstallation,
            &RegionProfile::default(),
        );
        assert!(prompt.contains("current_panel_count"));
        assert!(prompt.contains("panel_condition"));
    }

    #[test]
    fn test_validation_prompt_names_rejection_rules() {
        let prompt = validation_prompt();
        assert!(prompt.contains("collage"));
        assert!(prompt.contains("screenshot"));
    }
}
