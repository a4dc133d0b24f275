//! Analysis API handler
//!
//! POST /api/analyze

use axum::{extract::State, routing::post, Json, Router};
use base64::Engine as _;
use serde::Deserialize;
use sunplan_common::models::{Address, AnalysisMode, AnalysisReport};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::{CostOptions, PanelTier, RoofMaterial};
use crate::error::{AnalysisError, ApiError, ApiResult};
use crate::pipeline::AnalysisRequest;
use crate::AppState;

/// Request body for POST /api/analyze
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image, optionally as a `data:` URI
    pub image_base64: String,
    pub mime_type: String,
    pub address: Address,
    #[serde(default)]
    pub mode: AnalysisMode,
    #[serde(default)]
    pub monthly_bill: Option<f64>,
    #[serde(default)]
    pub panel_tier: PanelTier,
    #[serde(default)]
    pub roof_material: RoofMaterial,
}

/// POST /api/analyze
///
/// The analysis is cancelled when the client goes away: dropping the handler
/// future drops the guard, which fires the token.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisReport>> {
    let image = decode_image(&body.image_base64)?;

    info!(
        mode = body.mode.as_str(),
        mime = %body.mime_type,
        bytes = image.len(),
        "Analysis request"
    );

    let request = AnalysisRequest {
        image,
        mime: body.mime_type,
        address: body.address,
        mode: body.mode,
        monthly_bill: body.monthly_bill,
        cost_options: CostOptions {
            panel_tier: body.panel_tier,
            roof_material: body.roof_material,
        },
    };

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.pipeline.run(request, &cancel).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            if is_operational(&err) {
                *state.last_error.write().await = Some(err.to_string());
            }
            Err(ApiError::Analysis(err))
        }
    }
}

/// Failures worth surfacing on /health; rejections of a caller's image are not
fn is_operational(err: &AnalysisError) -> bool {
    matches!(
        err,
        AnalysisError::ProviderExhausted { .. }
            | AnalysisError::MalformedResponse { .. }
            | AnalysisError::EngineInvariantViolation(_)
    )
}

fn decode_image(encoded: &str) -> ApiResult<Vec<u8>> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("image_base64 is not valid base64: {}", e)))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/api/analyze", post(analyze))
}
