//! Multipart session API tests over the in-memory backends.
//!
//! Run with: `cargo test -p mediagate-api --test uploads_test`

mod helpers;

use helpers::{api_path, create_tags, setup_test_app, upload_body, TestApp, MB};
use serde_json::{json, Value};
use uuid::Uuid;

async fn start_multipart(app: &TestApp) -> Uuid {
    let client = app.client();
    create_tags(client, &["training"]).await;
    let body: Value = client
        .post(&api_path("/files/multipart"))
        .json(&upload_body("drill.mp4", "video/mp4", 25 * MB, &["training"]))
        .await
        .json();
    Uuid::parse_str(body["session_id"].as_str().unwrap()).unwrap()
}

/// Uploads `count` parts straight to storage and returns their ETags in order.
async fn upload_parts(app: &TestApp, session_id: Uuid, count: i32) -> Vec<String> {
    let session = app.session(session_id).await;
    (1..=count)
        .map(|n| {
            app.storage
                .upload_part(&session.provider_upload_id, n, vec![n as u8; 16])
                .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_presign_parts_returns_one_url_per_part() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/parts", session_id)))
        .json(&json!({
            "parts": [
                { "part_number": 1, "checksum": "c1", "content_length": 10 * MB },
                { "part_number": 2, "checksum": "c2", "content_length": 10 * MB },
            ]
        }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    let parts = body["presigned_parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1]["part_number"], 2);
    assert!(parts[0]["presigned_url"]
        .as_str()
        .unwrap()
        .contains("partNumber=1"));
}

#[tokio::test]
async fn test_presign_parts_rejects_invalid_part() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/parts", session_id)))
        .json(&json!({
            "parts": [{ "part_number": 1, "checksum": "c1", "content_length": 0 }]
        }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_presign_parts_for_unknown_session_is_404() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/parts", Uuid::new_v4())))
        .json(&json!({
            "parts": [{ "part_number": 1, "checksum": "c1", "content_length": 10 }]
        }))
        .await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_list_parts_pages_with_marker() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;
    upload_parts(&app, session_id, 3).await;
    let path = api_path(&format!("/uploads/{}/parts", session_id));

    let response = app
        .client()
        .get(&path)
        .add_query_param("max_parts", 2)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["parts"].as_array().unwrap().len(), 2);
    assert_eq!(body["parts_marker"], 2);

    let body: Value = app
        .client()
        .get(&path)
        .add_query_param("max_parts", 2)
        .add_query_param("marker", 2)
        .await
        .json();
    assert_eq!(body["parts"][0]["part_number"], 3);
    assert_eq!(body["parts_marker"], 0);
}

#[tokio::test]
async fn test_complete_multipart_upload_assembles_object() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;
    let etags = upload_parts(&app, session_id, 2).await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/complete", session_id)))
        .json(&json!({
            "parts": [
                { "part_number": 2, "etag": etags[1] },
                { "part_number": 1, "etag": etags[0] },
            ]
        }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    let file_id = Uuid::parse_str(body["file_id"].as_str().unwrap()).unwrap();
    assert_eq!(app.storage.complete_calls(), 1);

    let file = app.uow.snapshot().await.files[&file_id].clone();
    assert!(app.storage.has_object(&file.storage_key));
    assert_eq!(file.status.as_str(), "uploading");
}

#[tokio::test]
async fn test_complete_with_wrong_etag_is_conflict() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;
    let etags = upload_parts(&app, session_id, 2).await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/complete", session_id)))
        .json(&json!({
            "parts": [
                { "part_number": 1, "etag": etags[0] },
                { "part_number": 2, "etag": "\"not-the-etag\"" },
            ]
        }))
        .await;

    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["code"], "ETAG_MISMATCH");
    assert_eq!(app.storage.complete_calls(), 0);
}

#[tokio::test]
async fn test_complete_with_missing_part_is_conflict() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;
    let etags = upload_parts(&app, session_id, 1).await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/complete", session_id)))
        .json(&json!({
            "parts": [
                { "part_number": 1, "etag": etags[0] },
                { "part_number": 2, "etag": "\"never-uploaded\"" },
            ]
        }))
        .await;

    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["code"], "PARTS_COUNT_MISMATCH");
}

#[tokio::test]
async fn test_complete_without_parts_is_400() {
    let app = setup_test_app().await;
    let session_id = start_multipart(&app).await;

    let response = app
        .client()
        .post(&api_path(&format!("/uploads/{}/complete", session_id)))
        .json(&json!({ "parts": [] }))
        .await;

    assert_eq!(response.status_code(), 400);
}
