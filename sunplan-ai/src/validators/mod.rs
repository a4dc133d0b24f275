//! Provider payload validation layer
//!
//! Nothing a provider returns reaches the typed records without passing
//! through this module.
//!
//! # Validators
//! 1. **payload** - JSON object extraction and lenient field readers
//! 2. **roof_sanitizer** - schema, range and business-rule checks for
//!    structured roof analyses
//! 3. **verdict** - image validator reply parsing

pub mod payload;
pub mod roof_sanitizer;
pub mod verdict;

pub use payload::{extract_json_object, FieldReader};
pub use roof_sanitizer::{RoofSanitizer, SanitizeError, SanitizedAnalysis};
pub use verdict::{parse_verdict, Verdict};
