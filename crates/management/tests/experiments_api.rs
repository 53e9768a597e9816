#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use clickpilot_management::{
    management_router, ExperimentStore, InMemoryCatalog, ManagementState, SessionStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let state = ManagementState {
        store: Arc::new(ExperimentStore::new(Arc::new(InMemoryCatalog::with_demo_videos()))),
        sessions: Arc::new(SessionStore::new(24)),
    };
    management_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({"username": "demo", "password": "demo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn create(app: &Router, token: &str, images: usize) -> (StatusCode, Value) {
    let images: Vec<String> = (0..images).map(|i| format!("https://img.example/{i}.jpg")).collect();
    send(
        app,
        "POST",
        "/api/v1/experiments",
        Some(token),
        Some(json!({
            "subjectRef": "vid001",
            "variantImages": images,
            "durationHours": 48.0,
            "rotationIntervalHours": 4.0,
            "autoPublish": true,
        })),
    )
    .await
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/v1/experiments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_auth");

    let (status, body) = send(&app, "GET", "/api/v1/experiments", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_bad_credentials() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({"username": "demo", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_login_body_is_bad_request() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/v1/auth/login", None, Some(json!({"username": "demo"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_create_requires_every_field() {
    let app = app();
    let token = login(&app).await;
    let full = json!({
        "subjectRef": "vid002",
        "variantImages": ["a.jpg", "b.jpg"],
        "durationHours": 24.0,
        "rotationIntervalHours": 2.0,
        "autoPublish": false,
    });
    for field in ["rotationIntervalHours", "autoPublish"] {
        let mut body = full.clone();
        body.as_object_mut().unwrap().remove(field);
        let (status, resp) = send(&app, "POST", "/api/v1/experiments", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {field}");
        assert_eq!(resp["error"], "validation_error");
    }
    let (status, _) = send(&app, "POST", "/api/v1/experiments", Some(&token), Some(full)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let app = app();
    let token = login(&app).await;

    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Demo User");

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_experiment_lifecycle() {
    let app = app();
    let token = login(&app).await;

    let (status, created) = create(&app, &token, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "active");
    assert_eq!(created["subjectTitle"], "How to Master React Hooks in 10 Minutes");
    assert!(created["leadingVariantId"].is_null());
    let id = created["id"].as_str().unwrap().to_string();
    let a = created["variants"][0]["id"].as_str().unwrap().to_string();
    let b = created["variants"][1]["id"].as_str().unwrap().to_string();

    let metrics_uri = format!("/api/v1/experiments/{id}/metrics");
    let (status, _) = send(
        &app,
        "POST",
        &metrics_uri,
        Some(&token),
        Some(json!({"variantId": a, "impressionsDelta": 1000, "clicksDelta": 120})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "POST",
        &metrics_uri,
        Some(&token),
        Some(json!({"variantId": b, "impressionsDelta": 1000, "clicksDelta": 150})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = send(&app, "GET", &format!("/api/v1/experiments/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["totalImpressions"], 2000);
    assert!((view["averageCtr"].as_f64().unwrap() - 13.5).abs() < 1e-9);
    assert_eq!(view["leadingVariantId"], b.as_str());

    // Not due yet.
    let (status, view) = send(&app, "POST", &format!("/api/v1/experiments/{id}/tick"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "active");

    let (status, view) = send(&app, "POST", &format!("/api/v1/experiments/{id}/stop"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "completed");
    assert_eq!(view["winningVariantId"], b.as_str());
    assert!((view["improvementPercent"].as_f64().unwrap() - 25.0).abs() < 1e-9);
    assert!(view["leadingVariantId"].is_null());

    // Auto-publish pushed the winner to the catalog.
    let (_, video) = send(&app, "GET", "/api/v1/videos/vid001", Some(&token), None).await;
    assert_eq!(video["thumbnail"], "https://img.example/1.jpg");

    let (status, body) = send(
        &app,
        "POST",
        &metrics_uri,
        Some(&token),
        Some(json!({"variantId": a, "impressionsDelta": 1, "clicksDelta": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    let (_, completed) = send(&app, "GET", "/api/v1/experiments?status=completed", Some(&token), None).await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
    let (_, active) = send(&app, "GET", "/api/v1/experiments?status=active", Some(&token), None).await;
    assert!(active.as_array().unwrap().is_empty());

    let (_, dashboard) = send(&app, "GET", "/api/v1/dashboard", Some(&token), None).await;
    assert_eq!(dashboard["activeTests"], 0);
    assert_eq!(dashboard["completedTests"], 1);
    assert_eq!(dashboard["totalImpressions"], 2000);

    let (_, audit) = send(&app, "GET", "/api/v1/audit-log", Some(&token), None).await;
    assert!(audit
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["action"] == "publish" && e["resourceId"] == id.as_str()));
}

#[tokio::test]
async fn test_variant_count_is_validated() {
    let app = app();
    let token = login(&app).await;
    for count in [1, 6] {
        let (status, body) = create(&app, &token, count).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }
    let (_, list) = send(&app, "GET", "/api/v1/experiments", Some(&token), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_video_is_rejected() {
    let app = app();
    let token = login(&app).await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/experiments",
        Some(&token),
        Some(json!({
            "subjectRef": "nope",
            "variantImages": ["a", "b"],
            "durationHours": 24.0,
            "rotationIntervalHours": 2.0,
            "autoPublish": false,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_errors() {
    let app = app();
    let token = login(&app).await;
    let (_, created) = create(&app, &token, 3).await;
    let id = created["id"].as_str().unwrap();
    let a = created["variants"][0]["id"].as_str().unwrap();
    let uri = format!("/api/v1/experiments/{id}/metrics");

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&token),
        Some(json!({"variantId": a, "impressionsDelta": -5, "clicksDelta": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&token),
        Some(json!({"variantId": a, "impressionsDelta": 10, "clicksDelta": 11})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&token),
        Some(json!({"variantId": uuid_str(), "impressionsDelta": 10, "clicksDelta": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/experiments/{}/metrics", uuid_str()),
        Some(&token),
        Some(json!({"variantId": a, "impressionsDelta": 10, "clicksDelta": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Rejected deltas leave the counters untouched.
    let (_, view) = send(&app, "GET", &format!("/api/v1/experiments/{id}"), Some(&token), None).await;
    assert_eq!(view["totalImpressions"], 0);
}

#[tokio::test]
async fn test_videos_listing() {
    let app = app();
    let token = login(&app).await;
    let (status, videos) = send(&app, "GET", "/api/v1/videos", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(videos.as_array().unwrap().len(), 9);

    let (status, _) = send(&app, "GET", "/api/v1/videos/missing", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn uuid_str() -> String {
    "00000000-0000-4000-8000-000000000000".to_string()
}
