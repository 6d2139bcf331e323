//! Fixtures shared by the service tests.

use chrono::{Duration as ChronoDuration, Utc};
use mediagate_core::models::{FileMetadata, FileStatus, FileTag, NewFile, UploadSession};
use mediagate_core::{classify, PresignConfig, UploadConfig};
use mediagate_db::MemoryUnitOfWork;
use mediagate_storage::MemoryStorage;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::files::FileService;

pub const MB: i64 = 1024 * 1024;
pub const CHECKSUM: &str = "n4bQgYhMfWWaL+qgxVrQFaO/TxsrC4Is0V1sFbDwCgg=";

pub fn upload_config() -> UploadConfig {
    UploadConfig {
        single_upload_max_bytes: 10 * MB,
        multipart_upload_max_bytes: 5 * 1024 * MB,
        part_size_bytes: 10 * MB,
        session_ttl: Duration::from_secs(30 * 60),
        cleanup_interval: Duration::from_secs(15 * 60),
    }
}

pub struct Harness {
    pub uow: Arc<MemoryUnitOfWork>,
    pub storage: Arc<MemoryStorage>,
    pub files: FileService<MemoryUnitOfWork>,
}

impl Harness {
    pub fn new() -> Self {
        let uow = Arc::new(MemoryUnitOfWork::new());
        let storage = Arc::new(MemoryStorage::new());
        let files = FileService::new(
            uow.clone(),
            storage.clone(),
            upload_config(),
            PresignConfig::default(),
        );
        Self {
            uow,
            storage,
            files,
        }
    }
}

pub fn new_file(filename: &str, mime_type: &str, size_bytes: i64, tags: &[&str]) -> NewFile {
    NewFile {
        filename: filename.to_string(),
        mime_type: mime_type.to_string(),
        size_bytes,
        checksum: CHECKSUM.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Inserts an `uploading` file linked to `tag_ids`, last updated `age` ago.
pub async fn seed_file(
    uow: &MemoryUnitOfWork,
    filename: &str,
    mime_type: &str,
    size_bytes: i64,
    tag_ids: &[Uuid],
    age: ChronoDuration,
) -> FileMetadata {
    let new_file = new_file(filename, mime_type, size_bytes, &[]);
    let media_type = classify(filename, mime_type).unwrap();
    let mut file = FileMetadata::new_uploading(&new_file, mime_type.to_string(), media_type);
    file.updated_at = Utc::now() - age;
    file.status = FileStatus::Uploading;

    let seeded = file.clone();
    let tag_ids = tag_ids.to_vec();
    uow.seed(move |state| {
        for tag_id in tag_ids {
            state.file_tags.insert(FileTag {
                file_id: seeded.id,
                tag_id,
            });
        }
        state.files.insert(seeded.id, seeded);
    })
    .await;
    file
}

/// Inserts an open session for `file` expiring at `now + expires_in`.
pub async fn seed_session(
    uow: &MemoryUnitOfWork,
    file: &FileMetadata,
    provider_upload_id: &str,
    expires_in: ChronoDuration,
) -> UploadSession {
    let session = UploadSession::open(
        file.id,
        provider_upload_id.to_string(),
        10 * MB,
        Utc::now() + expires_in,
    );
    let seeded = session.clone();
    uow.seed(move |state| {
        state.sessions.insert(seeded.id, seeded);
    })
    .await;
    session
}
