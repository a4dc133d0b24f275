//! HTTP API handlers for sunplan-ai
//!
//! - `GET /health` - liveness, uptime and build identification
//! - `POST /api/analyze` - run one rooftop analysis

pub mod analyze;
pub mod health;

pub use analyze::analyze_routes;
pub use health::health_routes;
