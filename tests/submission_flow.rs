//! End-to-end submission flow against the in-memory backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use tower::ServiceExt;

use fieldsheet_backend::app::{create_app, AppState};
use fieldsheet_backend::config::{BackendKind, Environment, Settings};
use fieldsheet_backend::services::MemoryBackend;

fn test_settings() -> Settings {
    Settings {
        env: Environment::Dev,
        server_addr: "127.0.0.1:0".to_string(),
        cors_allow_origins: vec!["http://localhost:3000".to_string()],
        backend: BackendKind::Memory,
        drive_api_url: String::new(),
        drive_upload_url: String::new(),
        sheets_api_url: String::new(),
        google_access_token: String::new(),
        assets_root_folder_id: String::new(),
        api_timeout_seconds: 5,
        upload_timeout_seconds: 5,
        upload_pacing_ms: 0,
    }
}

fn test_app(backend: MemoryBackend) -> Router {
    let state = AppState::new(test_settings(), Arc::new(backend));
    create_app(state)
}

fn photo(name: &str) -> Value {
    json!({
        "name": name,
        "data": BASE64.encode(b"image bytes"),
        "caption": format!("caption for {name}"),
    })
}

fn submission() -> Value {
    json!({
        "header": {
            "work_order": "WO-4821",
            "unit_id": "204",
            "address": "1400 Maple Ave",
            "square_footage": "850",
            "layout": "2BR/1BA",
        },
        "scope": {
            "source": "Repaint **all** walls and replace flooring.",
            "translated": "Pintar todas las paredes y reemplazar pisos.",
        },
        "items": [
            { "category": "Painting", "item": "Walls", "description": "Paint",
              "unit": "SF", "quantity": 1200.0, "notes": "" },
            { "category": "Flooring", "item": "Vinyl Plank", "description": "Remove & Install",
              "unit": "SF", "quantity": 850.0, "notes": "living room + bedrooms" },
        ],
        "sketch": { "name": "sketch.png", "data": BASE64.encode(b"sketch bytes") },
        "photos": [photo("p1.jpg"), photo("p2.jpg"), photo("p3.jpg"),
                   photo("p4.jpg"), photo("p5.jpg")],
    })
}

async fn post_submission(app: Router, payload: &Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/assessments")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn full_submission_commits_a_document() {
    let backend = MemoryBackend::new();
    let app = test_app(backend.clone());

    let (status, body) = post_submission(app, &submission()).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["success"], true);
    assert_eq!(data["document_url"], "memory://documents/WO-4821");
    assert_eq!(data["photos"].as_array().unwrap().len(), 5);
    assert_eq!(data["sketch"]["status"], "uploaded");

    assert!(backend.document_exists("WO-4821"));

    // Delete-then-create precedes any directive application.
    let ops = backend.operations();
    let delete = ops.iter().position(|o| o == "delete:WO-4821").unwrap();
    let create = ops.iter().position(|o| o == "create:WO-4821").unwrap();
    let apply = ops.iter().position(|o| o == "apply:WO-4821").unwrap();
    assert!(delete < create && create < apply);
}

#[tokio::test]
async fn partial_photo_failure_does_not_fail_the_submission() {
    let backend = MemoryBackend::new();
    backend.fail_upload_of("p3.jpg");
    let app = test_app(backend.clone());

    let (status, body) = post_submission(app, &submission()).await;
    assert_eq!(status, StatusCode::OK);

    let photos = body["data"]["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 5);
    let failed: Vec<&str> = photos
        .iter()
        .filter(|p| p["status"] == "failed")
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(failed, vec!["p3.jpg"]);

    // The committed gallery embeds the four surviving photos plus the
    // sketch, renumbered with no gap.
    let batches = backend.document_batches("WO-4821").unwrap();
    let values = &batches[0].values;
    let captions: Vec<String> = values
        .iter()
        .filter_map(|v| match &v.payload {
            fieldsheet_backend::pipeline::layout::Payload::Text(t)
                if t.starts_with("Photo ") =>
            {
                Some(t.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(captions.len(), 4);
    assert!(captions[0].starts_with("Photo 1:"));
    assert!(captions[3].starts_with("Photo 4:"));

    let images = values
        .iter()
        .filter(|v| {
            matches!(
                v.payload,
                fieldsheet_backend::pipeline::layout::Payload::Image(_)
            )
        })
        .count();
    assert_eq!(images, 5); // sketch + 4 photos
}

#[tokio::test]
async fn resubmission_replaces_the_document_with_identical_content() {
    let backend = MemoryBackend::new();

    let (status, _) = post_submission(test_app(backend.clone()), &submission()).await;
    assert_eq!(status, StatusCode::OK);
    let first = backend.document_batches("WO-4821").unwrap();

    let (status, _) = post_submission(test_app(backend.clone()), &submission()).await;
    assert_eq!(status, StatusCode::OK);
    let second = backend.document_batches("WO-4821").unwrap();

    // Fresh document each time, same layout: no accumulated rows.
    assert_eq!(second.len(), 1);
    assert_eq!(first, second);
    assert_eq!(
        backend
            .operations()
            .iter()
            .filter(|o| *o == "create:WO-4821")
            .count(),
        2
    );
}

#[tokio::test]
async fn empty_item_list_is_rejected_with_a_named_field() {
    let mut payload = submission();
    payload["items"] = json!([]);

    let (status, body) = post_submission(test_app(MemoryBackend::new()), &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("no work items"));
}

#[tokio::test]
async fn missing_header_field_is_rejected_with_a_named_field() {
    let mut payload = submission();
    payload["header"]["unit_id"] = json!("  ");

    let (status, body) = post_submission(test_app(MemoryBackend::new()), &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unit_id"));
}

#[tokio::test]
async fn empty_work_order_falls_back_to_timestamp_name() {
    let backend = MemoryBackend::new();
    let mut payload = submission();
    payload["header"]["work_order"] = json!("");

    let (status, body) = post_submission(test_app(backend.clone()), &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["document_url"]
        .as_str()
        .unwrap()
        .contains("Assessment "));
}

#[tokio::test]
async fn submission_without_photos_or_sketch_still_commits() {
    let backend = MemoryBackend::new();
    let mut payload = submission();
    payload["photos"] = json!([]);
    payload["sketch"] = Value::Null;

    let (status, body) = post_submission(test_app(backend.clone()), &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["photos"].as_array().unwrap().len(), 0);
    assert!(body["data"]["sketch"].is_null());

    let batches = backend.document_batches("WO-4821").unwrap();
    assert!(!batches[0].values.iter().any(|v| {
        matches!(
            v.payload,
            fieldsheet_backend::pipeline::layout::Payload::Image(_)
        )
    }));
}
