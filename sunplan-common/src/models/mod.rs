//! Boundary records shared between the analysis service and its callers
//!
//! All records are immutable values created per analysis request.

pub mod location;
pub mod recommendation;
pub mod report;
pub mod roof;

pub use location::{Address, Coordinates, DataOrigin, GeocodeResult, LocationIrradiance, LocationSummary};
pub use recommendation::{
    FinancialProjection, Recommendation, SuitabilityRating, SuitabilityScore, SystemSpecs,
};
pub use report::{AnalysisReport, RoofFindings};
pub use roof::{
    AnalysisMode, Complexity, ExistingInstallationRecord, Orientation, PanelCondition, Priority,
    RoofRecord, Shading, Suggestion, SuggestionCategory,
};
