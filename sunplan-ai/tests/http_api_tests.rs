//! HTTP routing tests

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use helpers::fixtures::{self, COLLAGE, VALID};
use helpers::{entry, CallKind, ScriptedProvider, Step};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use sunplan_ai::{build_router, AppState};
use sunplan_common::config::PipelineConfig;
use tower::ServiceExt;

fn app(provider: &Arc<ScriptedProvider>) -> axum::Router {
    let pipeline = fixtures::pipeline(vec![entry(provider, &["m1"])], PipelineConfig::default());
    build_router(AppState::new(pipeline))
}

fn analyze_body(mime: &str) -> Value {
    json!({
        "image_base64": base64::engine::general_purpose::STANDARD.encode(fixtures::png_bytes()),
        "mime_type": mime,
        "address": {"street": "12 Sunny Lane", "city": "Zagreb", "country": "Croatia"},
        "mode": "new_installation",
        "monthly_bill": 120.0,
        "panel_tier": "premium",
        "roof_material": "tile"
    })
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_reports_providers() {
    let provider = Arc::new(ScriptedProvider::new("p1"));
    let response = app(&provider)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "sunplan-ai");
    assert_eq!(json["providers"], json!(["p1"]));
    assert!(json["build"]["git_hash"].is_string());
}

#[tokio::test]
async fn test_analyze_success() {
    let provider = Arc::new(
        ScriptedProvider::new("p1")
            .on(CallKind::Classify, "m1", vec![Step::reply(VALID)])
            .on(CallKind::Extract, "m1", vec![Step::Reply(fixtures::roof_json())])
            .on(CallKind::Text, "m1", vec![Step::reply("Go solar.")]),
    );

    let (status, json) = post_json(app(&provider), "/api/analyze", analyze_body("image/png")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["narrative_summary"], "Go solar.");
    assert_eq!(json["used_inference"], true);
    assert_eq!(json["roof_used_inference"], true);
    assert_eq!(json["narrative_used_inference"], true);
    assert_eq!(json["findings"]["kind"], "new_installation");
    assert!(json["financial_projection"]["annual_savings"].as_f64().unwrap() <= 1440.0 + 1e-9);
}

#[tokio::test]
async fn test_analyze_collage_is_422() {
    let provider = Arc::new(
        ScriptedProvider::new("p1").on(CallKind::Classify, "m1", vec![Step::reply(COLLAGE)]),
    );

    let (status, json) = post_json(app(&provider), "/api/analyze", analyze_body("image/png")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "INVALID_IMAGE");
    assert!(json["error"]["message"].as_str().unwrap().contains("collage"));
    assert_eq!(provider.count(CallKind::Extract), 0);
}

#[tokio::test]
async fn test_analyze_unsupported_mime_is_415() {
    let provider = Arc::new(ScriptedProvider::new("p1"));

    let (status, json) = post_json(app(&provider), "/api/analyze", analyze_body("image/webp")).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["error"]["code"], "UNSUPPORTED_MEDIA");
}

#[tokio::test]
async fn test_analyze_bad_base64_is_400() {
    let provider = Arc::new(ScriptedProvider::new("p1"));
    let mut body = analyze_body("image/png");
    body["image_base64"] = json!("%%% not base64 %%%");

    let (status, json) = post_json(app(&provider), "/api/analyze", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_validator_outage_is_503_and_recorded() {
    let provider = Arc::new(
        ScriptedProvider::new("p1").on(
            CallKind::Classify,
            "m1",
            vec![Step::Fail(sunplan_ai::types::ProviderError::Server {
                status: 500,
                message: "down".into(),
            })],
        ),
    );
    let pipeline = fixtures::pipeline(vec![entry(&provider, &["m1"])], PipelineConfig::default());
    let state = AppState::new(pipeline);
    let last_error = state.last_error.clone();

    let (status, json) = post_json(build_router(state), "/api/analyze", analyze_body("image/png")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "PROVIDER_EXHAUSTED");
    // Provider detail stays in logs and diagnostics, not in the response
    assert!(!json["error"]["message"].as_str().unwrap().contains("down"));
    assert!(last_error.read().await.is_some());
}
