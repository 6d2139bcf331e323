//! Test helpers: build the router over the in-memory backends.

use axum_test::TestServer;
use chrono::Utc;
use mediagate_api::{build_router, AppState};
use mediagate_core::models::{FileStatus, UploadSession};
use mediagate_core::{PresignConfig, UploadConfig};
use mediagate_db::MemoryUnitOfWork;
use mediagate_services::{FileService, TagService};
use mediagate_storage::MemoryStorage;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const MB: i64 = 1024 * 1024;
pub const CHECKSUM: &str = "n4bQgYhMfWWaL+qgxVrQFaO/TxsrC4Is0V1sFbDwCgg=";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", mediagate_api::constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub uow: Arc<MemoryUnitOfWork>,
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// The open session row behind `session_id`.
    pub async fn session(&self, session_id: Uuid) -> UploadSession {
        self.uow.snapshot().await.sessions[&session_id].clone()
    }

    pub async fn mark_completed(&self, file_id: Uuid) {
        self.uow
            .seed(move |state| {
                if let Some(file) = state.files.get_mut(&file_id) {
                    file.status = FileStatus::Completed;
                    file.updated_at = Utc::now();
                }
            })
            .await;
    }
}

pub async fn setup_test_app() -> TestApp {
    let uow = Arc::new(MemoryUnitOfWork::new());
    let storage = Arc::new(MemoryStorage::new());

    let upload = UploadConfig {
        single_upload_max_bytes: 10 * MB,
        multipart_upload_max_bytes: 5 * 1024 * MB,
        part_size_bytes: 10 * MB,
        session_ttl: Duration::from_secs(30 * 60),
        cleanup_interval: Duration::from_secs(15 * 60),
    };
    let files = FileService::new(
        uow.clone(),
        storage.clone(),
        upload,
        PresignConfig::default(),
    );
    let tags = TagService::new(uow.clone());
    let router = build_router(Arc::new(AppState::new(files, tags)));

    TestApp {
        server: TestServer::new(router).expect("Failed to create test server"),
        uow,
        storage,
    }
}

pub async fn create_tags(client: &TestServer, names: &[&str]) {
    client
        .post(&api_path("/tags"))
        .json(&json!({ "tags": names }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

pub fn upload_body(filename: &str, content_type: &str, size_bytes: i64, tags: &[&str]) -> Value {
    json!({
        "filename": filename,
        "content_type": content_type,
        "size_bytes": size_bytes,
        "checksum_sha256": CHECKSUM,
        "tags": tags,
    })
}
