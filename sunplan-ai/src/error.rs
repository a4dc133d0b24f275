//! Error types for sunplan-ai
//!
//! `AnalysisError` is the closed outcome taxonomy of the pipeline. `ApiError`
//! maps it onto HTTP responses with body `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline failure taxonomy
///
/// `Display` carries diagnostic detail for logs; `user_message()` is the short
/// actionable text returned to callers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    /// Image is not a single usable photograph of a building roof
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Provider declared a confidence below the acceptance floor
    #[error("Low confidence: {confidence} below floor {floor}")]
    LowConfidence { confidence: u8, floor: u8 },

    /// New-installation analysis found panels already mounted
    #[error("Existing panels detected on roof")]
    ExistingPanelsDetected,

    /// Existing-installation analysis found no panels
    #[error("No panels detected on roof")]
    NoPanelsDetected,

    /// Every provider/model combination failed operationally
    #[error("All inference providers exhausted: {last_error}")]
    ProviderExhausted { last_error: String },

    /// Every failure was an unparseable provider payload
    #[error("Malformed provider response: {last_error}")]
    MalformedResponse { last_error: String },

    /// Mime type outside JPEG/PNG, or payload too large or empty
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Recommendation engine refused to emit an implausible result
    #[error("Engine invariant violation: {0}")]
    EngineInvariantViolation(String),

    /// Caller cancelled the analysis
    #[error("Analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidImage(_) => "INVALID_IMAGE",
            AnalysisError::LowConfidence { .. } => "LOW_CONFIDENCE",
            AnalysisError::ExistingPanelsDetected => "EXISTING_PANELS_DETECTED",
            AnalysisError::NoPanelsDetected => "NO_PANELS_DETECTED",
            AnalysisError::ProviderExhausted { .. } => "PROVIDER_EXHAUSTED",
            AnalysisError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            AnalysisError::UnsupportedMedia(_) => "UNSUPPORTED_MEDIA",
            AnalysisError::EngineInvariantViolation(_) => "ENGINE_INVARIANT_VIOLATION",
            AnalysisError::Cancelled => "CANCELLED",
        }
    }

    /// Short actionable message safe to show an end user
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::InvalidImage(reason) => format!(
                "The image was not accepted ({}). Upload a single clear photo in which the roof is plainly visible.",
                reason
            ),
            AnalysisError::LowConfidence { .. } => {
                "The roof could not be assessed reliably. Try a sharper photo taken from higher up with the whole roof in frame.".to_string()
            }
            AnalysisError::ExistingPanelsDetected => {
                "This roof already has solar panels. Use the existing-installation analysis instead.".to_string()
            }
            AnalysisError::NoPanelsDetected => {
                "No solar panels were found on this roof. Use the new-installation analysis instead.".to_string()
            }
            AnalysisError::ProviderExhausted { .. } => {
                "The image analysis service is temporarily unavailable. Please try again in a few minutes.".to_string()
            }
            AnalysisError::MalformedResponse { .. } => {
                "The image analysis service returned an unreadable result. Please try again.".to_string()
            }
            AnalysisError::UnsupportedMedia(reason) => format!(
                "Unsupported upload ({}). Send a JPEG or PNG photo within the size limit.",
                reason
            ),
            AnalysisError::EngineInvariantViolation(_) => {
                "The recommendation could not be computed for this roof. Please contact support.".to_string()
            }
            AnalysisError::Cancelled => "The analysis was cancelled.".to_string(),
        }
    }

    /// Rejections decided from a successfully parsed provider answer
    ///
    /// Answered with 422; the orchestrator never retries them.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidImage(_)
                | AnalysisError::LowConfidence { .. }
                | AnalysisError::ExistingPanelsDetected
                | AnalysisError::NoPanelsDetected
        )
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Pipeline outcome
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Analysis(err) => {
                let status = match err {
                    AnalysisError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    _ if err.is_business_rejection() => StatusCode::UNPROCESSABLE_ENTITY,
                    AnalysisError::ProviderExhausted { .. } | AnalysisError::Cancelled => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    AnalysisError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.user_message())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AnalysisError::UnsupportedMedia("image/gif".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                AnalysisError::InvalidImage("collage".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AnalysisError::NoPanelsDetected, StatusCode::UNPROCESSABLE_ENTITY),
            (
                AnalysisError::LowConfidence {
                    confidence: 12,
                    floor: 30,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AnalysisError::ExistingPanelsDetected, StatusCode::UNPROCESSABLE_ENTITY),
            (AnalysisError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (
                AnalysisError::ProviderExhausted {
                    last_error: "timeout".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AnalysisError::MalformedResponse {
                    last_error: "not json".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AnalysisError::EngineInvariantViolation("panels".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_user_message_hides_provider_detail() {
        let err = AnalysisError::ProviderExhausted {
            last_error: "HTTP 500 from upstream secret-host".into(),
        };
        assert!(!err.user_message().contains("secret-host"));
        assert!(err.to_string().contains("secret-host"));
    }

    #[test]
    fn test_business_rejections() {
        assert!(AnalysisError::ExistingPanelsDetected.is_business_rejection());
        assert!(AnalysisError::LowConfidence {
            confidence: 10,
            floor: 30
        }
        .is_business_rejection());
        assert!(!AnalysisError::Cancelled.is_business_rejection());
        assert!(!AnalysisError::MalformedResponse {
            last_error: String::new()
        }
        .is_business_rejection());
    }
}
