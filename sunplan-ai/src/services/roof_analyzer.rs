//! Structured Roof/Installation Analyzer
//!
//! One extraction call per attempt. The reply goes through the roof
//! sanitizer; the analyzer only classifies how the attempt ended.

use crate::prompts;
use crate::error::AnalysisError;
use crate::types::{ImagePayload, ProviderError, VisionProvider};
use crate::validators::{RoofSanitizer, SanitizeError, SanitizedAnalysis};
use sunplan_common::config::RegionProfile;
use sunplan_common::models::AnalysisMode;
use thiserror::Error;

/// Why one analysis attempt did not produce a record
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttemptFailure {
    /// Operational provider failure
    #[error(transparent)]
    Provider(ProviderError),

    /// Reply could not be turned into a record
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Well-formed answer rejecting the analysis; never retried
    #[error(transparent)]
    Rejected(AnalysisError),
}

impl From<SanitizeError> for AttemptFailure {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::Malformed(msg) => AttemptFailure::Malformed(msg),
            SanitizeError::Rejected(rejection) => AttemptFailure::Rejected(rejection),
        }
    }
}

/// Structured analyzer bound to the region's extraction prompts
pub struct RoofAnalyzer {
    sanitizer: RoofSanitizer,
    new_installation_prompt: String,
    existing_installation_prompt: String,
}

impl RoofAnalyzer {
    pub fn new(region: &RegionProfile, confidence_floor: u8, advisory_below: u8) -> Self {
        Self {
            sanitizer: RoofSanitizer::new(confidence_floor, advisory_below),
            new_installation_prompt: prompts::extraction_prompt(
                AnalysisMode::NewInstallation,
                region,
            ),
            existing_installation_prompt: prompts::extraction_prompt(
                AnalysisMode::ExistingInstallation,
                region,
            ),
        }
    }

    pub fn prompt(&self, mode: AnalysisMode) -> &str {
        match mode {
            AnalysisMode::NewInstallation => &self.new_installation_prompt,
            AnalysisMode::ExistingInstallation => &self.existing_installation_prompt,
        }
    }

    /// Issue the extraction call; the caller bounds it in time
    pub async fn request(
        &self,
        provider: &dyn VisionProvider,
        model: &str,
        image: &ImagePayload,
        mode: AnalysisMode,
    ) -> Result<String, ProviderError> {
        provider
            .extract_structured_analysis(model, image, self.prompt(mode))
            .await
    }

    /// Turn a raw reply into a sanitized analysis or a classified failure
    pub fn interpret(
        &self,
        mode: AnalysisMode,
        reply: Result<String, ProviderError>,
    ) -> Result<SanitizedAnalysis, AttemptFailure> {
        let reply = reply.map_err(AttemptFailure::Provider)?;
        Ok(self.sanitizer.sanitize_reply(mode, &reply)?)
    }
}
