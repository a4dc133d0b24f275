//! Rule-based improvement suggestions
//!
//! A pure function of the roof record and the system size. Output is sorted
//! by priority; rules of equal priority keep rule order.

use sunplan_common::config::RegionProfile;
use sunplan_common::models::{
    Complexity, Orientation, Priority, RoofRecord, Shading, Suggestion, SuggestionCategory,
    SystemSpecs,
};

/// Pitch deviation above which tilt brackets are suggested
const TILT_BRACKET_THRESHOLD_DEG: f64 = 10.0;

const MICROINVERTER_COST_PER_PANEL: f64 = 120.0;
const TILT_BRACKET_COST_PER_PANEL: f64 = 45.0;
const MAINTENANCE_VISIT_COST: f64 = 150.0;

pub fn suggest(roof: &RoofRecord, specs: &SystemSpecs, region: &RegionProfile) -> Vec<Suggestion> {
    let panels = specs.panel_count as f64;
    let mut suggestions = Vec::new();

    match roof.shading {
        Shading::Low => {}
        Shading::Medium => suggestions.push(
            Suggestion::new(
                SuggestionCategory::Shading,
                "Trim shading vegetation",
                "Partial shading was detected. Trimming nearby trees or branches before installation recovers lost production.",
                Priority::Medium,
            )
            .with_gain(10.0)
            .with_cost(300.0),
        ),
        Shading::High => suggestions.push(
            Suggestion::new(
                SuggestionCategory::Shading,
                "Reduce heavy shading",
                "Heavy shading was detected. Remove or trim the obstructions where possible, and place panels on the least shaded sections first.",
                Priority::High,
            )
            .with_gain(20.0)
            .with_cost(600.0),
        ),
    }

    match roof.complexity {
        Complexity::Simple => suggestions.push(Suggestion::new(
            SuggestionCategory::Inverter,
            "String inverter",
            "A single uniform roof plane suits a cost-effective string inverter.",
            Priority::Low,
        )),
        Complexity::Moderate | Complexity::Complex => {
            let priority = if roof.complexity == Complexity::Complex {
                Priority::High
            } else {
                Priority::Medium
            };
            suggestions.push(
                Suggestion::new(
                    SuggestionCategory::Inverter,
                    "Microinverters or power optimizers",
                    "Panels on several roof planes see different sun. Per-panel electronics keep one shaded or misaligned panel from dragging down the rest.",
                    priority,
                )
                .with_gain(8.0)
                .with_cost(panels * MICROINVERTER_COST_PER_PANEL),
            );
        }
    }

    match roof.orientation {
        Orientation::North => suggestions.push(
            Suggestion::new(
                SuggestionCategory::Mounting,
                "Favour the sunniest roof planes",
                "The main roof plane faces north and yields about a third less. Place panels on any east, west or south-facing sections first, or consider a ground or carport mount.",
                Priority::Medium,
            )
            .with_gain(15.0),
        ),
        Orientation::East | Orientation::West => suggestions.push(Suggestion::new(
            SuggestionCategory::Advisory,
            "East-west production profile",
            "An east or west-facing roof produces less at midday but more in the morning or evening, which suits households with high use at those times.",
            Priority::Low,
        )),
        Orientation::South | Orientation::Flat => {}
    }

    let deviation = (roof.pitch_deg - region.optimal_pitch_deg).abs();
    if needs_tilt_brackets(roof, region) {
        suggestions.push(
            Suggestion::new(
                SuggestionCategory::Mounting,
                "Tilt mounting brackets",
                format!(
                    "The roof pitch of {:.0}° is {:.0}° away from the optimal {:.0}°. Adjustable brackets bring the panels closer to the optimal angle.",
                    roof.pitch_deg, deviation, region.optimal_pitch_deg
                ),
                Priority::Medium,
            )
            .with_gain((deviation * 0.5).min(15.0))
            .with_cost(panels * TILT_BRACKET_COST_PER_PANEL),
        );
    }

    suggestions.push(Suggestion::new(
        SuggestionCategory::Grid,
        "Set up net metering",
        "Register the system with the grid operator for net metering so surplus daytime production is credited against evening use.",
        Priority::High,
    ));

    suggestions.push(
        Suggestion::new(
            SuggestionCategory::Maintenance,
            "Seasonal maintenance",
            "Inspect and clean the panels in spring and autumn, and check mounts and wiring after storms.",
            Priority::Low,
        )
        .with_gain(3.0)
        .with_cost(MAINTENANCE_VISIT_COST),
    );

    suggestions.sort_by_key(|s| s.priority);
    suggestions
}

/// True when the pitch deviates far enough from the optimum to warrant tilt brackets
pub fn needs_tilt_brackets(roof: &RoofRecord, region: &RegionProfile) -> bool {
    (roof.pitch_deg - region.optimal_pitch_deg).abs() > TILT_BRACKET_THRESHOLD_DEG
}
