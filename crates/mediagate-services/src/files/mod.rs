//! File upload orchestration
//!
//! `FileService` owns the upload lifecycle of a file: requesting a simple or multipart
//! upload, driving the multipart session, and committing the terminal state once an
//! upload has been verified against storage.
//!
//! Nothing here marks a file `completed` from a client call. Completion is only
//! recorded by [`FileService::finalize_upload`], after storage reported the object.

mod download;
mod finalize;
mod multipart;
mod upload;

use chrono::{DateTime, Utc};
use mediagate_core::models::{FileMetadata, Tag, UploadSession};
use mediagate_core::{AppError, PresignConfig, UploadConfig};
use mediagate_db::UnitOfWork;
use mediagate_storage::FileStorage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use multipart::MAX_LIST_PARTS;

/// What a client needs to PUT a file in one request.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    pub file_id: Uuid,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

/// An open multipart session and the part size the client must use.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MultipartUploadTicket {
    pub session_id: Uuid,
    pub part_size: i64,
}

/// Download link of a completed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileDownload {
    pub url: String,
    pub filename: String,
    pub tags: Vec<Tag>,
    pub expires_at: DateTime<Utc>,
}

pub struct FileService<U> {
    uow: Arc<U>,
    storage: Arc<dyn FileStorage>,
    upload: UploadConfig,
    presign: PresignConfig,
}

impl<U> Clone for FileService<U> {
    fn clone(&self) -> Self {
        Self {
            uow: self.uow.clone(),
            storage: self.storage.clone(),
            upload: self.upload.clone(),
            presign: self.presign.clone(),
        }
    }
}

impl<U: UnitOfWork> FileService<U> {
    pub fn new(
        uow: Arc<U>,
        storage: Arc<dyn FileStorage>,
        upload: UploadConfig,
        presign: PresignConfig,
    ) -> Self {
        Self {
            uow,
            storage,
            upload,
            presign,
        }
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    fn session_deadline(&self) -> Result<DateTime<Utc>, AppError> {
        Ok(Utc::now() + to_chrono(self.upload.session_ttl)?)
    }

    /// Loads an open session with its file and pushes the session expiry forward.
    async fn touch_session(
        &self,
        session_id: Uuid,
    ) -> Result<(UploadSession, FileMetadata), AppError> {
        let expires_at = self.session_deadline()?;
        self.uow
            .execute(move |repos| {
                Box::pin(async move {
                    let session = repos.sessions().find_active_by_id(session_id).await?;
                    repos
                        .sessions()
                        .update_expires_at(session_id, expires_at)
                        .await?;
                    let file = repos.files().find_by_id(session.file_id).await?;
                    Ok((session, file))
                })
            })
            .await
    }
}

pub(crate) fn to_chrono(duration: Duration) -> Result<chrono::Duration, AppError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| AppError::Internal(format!("duration out of range: {}", e)))
}
