//! sunplan-ai library interface
//!
//! Rooftop solar analysis: image validation and structured roof analysis
//! through interchangeable vision providers, deterministic sizing and
//! financials, and a narrative summary. Exposed as a library for the binary
//! and for integration testing.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod services;
pub mod types;
pub mod validators;

pub use crate::error::{AnalysisError, ApiError, ApiResult};
pub use crate::pipeline::{AnalysisPipeline, AnalysisRequest};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Room for JSON fields around the base64 image
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last operational error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: AnalysisPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // base64 inflates the image by 4/3
    let body_limit = state.pipeline.settings().max_image_bytes / 3 * 4 + BODY_OVERHEAD_BYTES;

    Router::new()
        .merge(api::health_routes())
        .merge(api::analyze_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
