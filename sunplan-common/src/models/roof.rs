//! Roof and installation records produced by structured image analysis
//!
//! Every record here has already been sanitized: numeric fields sit inside the
//! bands declared as associated constants, and enum fields hold one of the
//! known variants. Raw provider payloads never reach these types directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Which analysis flow the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Plan a new installation on a bare roof
    #[default]
    NewInstallation,
    /// Assess panels already mounted on the roof
    ExistingInstallation,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::NewInstallation => "new_installation",
            AnalysisMode::ExistingInstallation => "existing_installation",
        }
    }
}

/// Shading level over the usable roof surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shading {
    Low,
    Medium,
    High,
}

/// Roof geometry complexity (valleys, dormers, hips)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Dominant orientation of the main roof plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    North,
    South,
    East,
    West,
    Flat,
}

/// Visible condition of mounted panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelCondition {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Suggestion priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Suggestion category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    Shading,
    Inverter,
    Mounting,
    Grid,
    Maintenance,
    Cleaning,
    Repair,
    Upgrade,
    Monitoring,
    Advisory,
    Other,
}

// Label parsing accepts the loose vocabulary vision models tend to use
// ("partial shade", "South-facing", "HIGH") and maps it onto the closed set.

impl FromStr for Shading {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = normalize(s);
        match label.as_str() {
            "low" | "none" | "minimal" | "minor" | "light" | "no shading" => Ok(Shading::Low),
            "medium" | "moderate" | "partial" | "some" => Ok(Shading::Medium),
            "high" | "heavy" | "significant" | "severe" | "full" => Ok(Shading::High),
            _ => Err(Error::InvalidInput(format!("Unknown shading level: {}", s))),
        }
    }
}

impl FromStr for Complexity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = normalize(s);
        match label.as_str() {
            "simple" | "low" | "basic" => Ok(Complexity::Simple),
            "moderate" | "medium" | "average" => Ok(Complexity::Moderate),
            "complex" | "high" | "very complex" => Ok(Complexity::Complex),
            _ => Err(Error::InvalidInput(format!("Unknown roof complexity: {}", s))),
        }
    }
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = normalize(s);
        let label = label
            .trim_end_matches(" facing")
            .trim_end_matches("-facing")
            .trim();
        match label {
            "north" | "n" | "northeast" | "northwest" => Ok(Orientation::North),
            "south" | "s" | "southeast" | "southwest" => Ok(Orientation::South),
            "east" | "e" => Ok(Orientation::East),
            "west" | "w" => Ok(Orientation::West),
            "flat" | "none" | "horizontal" => Ok(Orientation::Flat),
            _ => Err(Error::InvalidInput(format!("Unknown orientation: {}", s))),
        }
    }
}

impl FromStr for PanelCondition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = normalize(s);
        match label.as_str() {
            "excellent" | "new" | "like new" => Ok(PanelCondition::Excellent),
            "good" => Ok(PanelCondition::Good),
            "fair" | "average" | "worn" => Ok(PanelCondition::Fair),
            "poor" | "bad" | "damaged" => Ok(PanelCondition::Poor),
            _ => Err(Error::InvalidInput(format!("Unknown panel condition: {}", s))),
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" | "urgent" | "critical" => Ok(Priority::High),
            "medium" | "moderate" | "normal" => Ok(Priority::Medium),
            "low" | "optional" => Ok(Priority::Low),
            _ => Err(Error::InvalidInput(format!("Unknown priority: {}", s))),
        }
    }
}

impl FromStr for SuggestionCategory {
    type Err = Error;

    /// Never fails: unknown labels map to `Other`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match normalize(s).as_str() {
            "shading" | "trimming" | "vegetation" => SuggestionCategory::Shading,
            "inverter" | "inverters" | "electrical" => SuggestionCategory::Inverter,
            "mounting" | "tilt" | "racking" => SuggestionCategory::Mounting,
            "grid" | "net metering" | "net-metering" | "billing" => SuggestionCategory::Grid,
            "maintenance" => SuggestionCategory::Maintenance,
            "cleaning" => SuggestionCategory::Cleaning,
            "repair" | "replacement" => SuggestionCategory::Repair,
            "upgrade" | "expansion" | "battery" | "storage" => SuggestionCategory::Upgrade,
            "monitoring" => SuggestionCategory::Monitoring,
            "advisory" | "notice" => SuggestionCategory::Advisory,
            _ => SuggestionCategory::Other,
        };
        Ok(category)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', " ")
}

impl fmt::Display for Shading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Shading::Low => "low",
            Shading::Medium => "medium",
            Shading::High => "high",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Orientation::North => "north",
            Orientation::South => "south",
            Orientation::East => "east",
            Orientation::West => "west",
            Orientation::Flat => "flat",
        };
        f.write_str(label)
    }
}

/// Advisory produced either by the recommendation rules or by the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: SuggestionCategory,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Expected production/efficiency gain in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_gain_pct: Option<f64>,
    /// Expected one-off cost in the configured currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

impl Suggestion {
    pub fn new(
        category: SuggestionCategory,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            category,
            title: title.into(),
            description: description.into(),
            priority,
            estimated_gain_pct: None,
            estimated_cost: None,
        }
    }

    pub fn with_gain(mut self, gain_pct: f64) -> Self {
        self.estimated_gain_pct = Some(gain_pct);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }
}

/// Sanitized roof facts extracted from a photograph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoofRecord {
    /// Total roof area in m²
    pub area_m2: f64,
    /// Share of the area available for panels, in percent
    pub usable_area_pct: f64,
    pub shading: Shading,
    /// Roof pitch in degrees
    pub pitch_deg: f64,
    pub complexity: Complexity,
    pub orientation: Orientation,
    /// Chimneys, vents, skylights and similar obstructions
    pub obstacles: Vec<String>,
    pub estimated_panel_count: u32,
    /// Tilt the provider considers optimal for this roof, in degrees
    pub optimal_tilt_deg: f64,
    /// Provider confidence, 0-100
    pub confidence: u8,
}

impl RoofRecord {
    pub const AREA_M2: (f64, f64) = (50.0, 300.0);
    pub const USABLE_AREA_PCT: (f64, f64) = (30.0, 95.0);
    pub const PITCH_DEG: (f64, f64) = (5.0, 60.0);
    pub const OPTIMAL_TILT_DEG: (f64, f64) = (20.0, 60.0);
    pub const PANEL_COUNT: (u32, u32) = (5, 30);
    pub const CONFIDENCE: (u8, u8) = (0, 100);

    /// Usable area in m²
    pub fn usable_area_m2(&self) -> f64 {
        self.area_m2 * self.usable_area_pct / 100.0
    }

    /// True when every numeric field lies inside its documented band
    pub fn is_within_bounds(&self) -> bool {
        within(self.area_m2, Self::AREA_M2)
            && within(self.usable_area_pct, Self::USABLE_AREA_PCT)
            && within(self.pitch_deg, Self::PITCH_DEG)
            && within(self.optimal_tilt_deg, Self::OPTIMAL_TILT_DEG)
            && (Self::PANEL_COUNT.0..=Self::PANEL_COUNT.1).contains(&self.estimated_panel_count)
            && self.confidence <= Self::CONFIDENCE.1
    }
}

fn within(value: f64, (lo, hi): (f64, f64)) -> bool {
    value.is_finite() && value >= lo && value <= hi
}

/// Assessment of panels already mounted on a roof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingInstallationRecord {
    pub roof: RoofRecord,
    pub current_panel_count: u32,
    /// Estimated current efficiency, percent
    pub current_efficiency_pct: f64,
    /// Efficiency reachable after the suggested improvements, percent
    pub potential_efficiency_pct: f64,
    pub panel_condition: PanelCondition,
    /// Improvements ordered by priority
    pub improvements: Vec<Suggestion>,
}

impl ExistingInstallationRecord {
    /// Physical maximum of mounted panels per m² of roof (1.7 m² module + gaps)
    pub const MAX_PANEL_DENSITY_PER_M2: f64 = 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shading_labels() {
        assert_eq!("LOW".parse::<Shading>().unwrap(), Shading::Low);
        assert_eq!("partial".parse::<Shading>().unwrap(), Shading::Medium);
        assert_eq!(" heavy ".parse::<Shading>().unwrap(), Shading::High);
        assert!("purple".parse::<Shading>().is_err());
    }

    #[test]
    fn test_orientation_labels() {
        assert_eq!("South-facing".parse::<Orientation>().unwrap(), Orientation::South);
        assert_eq!("north facing".parse::<Orientation>().unwrap(), Orientation::North);
        assert_eq!("flat".parse::<Orientation>().unwrap(), Orientation::Flat);
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        assert_eq!(
            "gutter".parse::<SuggestionCategory>().unwrap(),
            SuggestionCategory::Other
        );
        assert_eq!(
            "net_metering".parse::<SuggestionCategory>().unwrap(),
            SuggestionCategory::Grid
        );
    }

    #[test]
    fn test_usable_area() {
        let roof = RoofRecord {
            area_m2: 100.0,
            usable_area_pct: 70.0,
            shading: Shading::Low,
            pitch_deg: 36.0,
            complexity: Complexity::Simple,
            orientation: Orientation::South,
            obstacles: vec![],
            estimated_panel_count: 18,
            optimal_tilt_deg: 36.0,
            confidence: 80,
        };
        assert!((roof.usable_area_m2() - 70.0).abs() < 1e-9);
        assert!(roof.is_within_bounds());
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        let json = serde_json::to_string(&AnalysisMode::ExistingInstallation).unwrap();
        assert_eq!(json, "\"existing_installation\"");
    }
}
