use async_trait::async_trait;
use mediagate_core::media_type::{normalize_content_type, SNIFF_LEN};
use mediagate_core::models::{FileMetadata, UploadNotification};
use mediagate_core::{sniff_content_type, AppError};
use mediagate_db::UnitOfWork;
use mediagate_storage::FileStorage;
use std::sync::Arc;
use uuid::Uuid;

use super::MessageHandler;
use crate::files::FileService;

/// Cross-checks an uploaded object against its declared metadata and commits the
/// outcome through [`FileService::finalize_upload`].
pub struct NotificationService<U> {
    uow: Arc<U>,
    storage: Arc<dyn FileStorage>,
    files: FileService<U>,
}

impl<U: UnitOfWork> NotificationService<U> {
    pub fn new(uow: Arc<U>, storage: Arc<dyn FileStorage>, files: FileService<U>) -> Self {
        Self {
            uow,
            storage,
            files,
        }
    }

    async fn load_file(&self, file_id: Uuid) -> Result<FileMetadata, AppError> {
        self.uow
            .execute(move |repos| Box::pin(async move { repos.files().find_by_id(file_id).await }))
            .await
    }

    /// Reconciles one storage notification.
    ///
    /// A missing file or an unreachable object is returned as an error so the broker
    /// redelivers. A checksum or size mismatch is recorded as the failure cause, and
    /// the size check runs last, so it wins when both fail. A content sniff that
    /// disagrees with the declared type is returned as-is, without finalizing.
    #[tracing::instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub async fn reconcile(&self, payload: &[u8]) -> Result<(), AppError> {
        let notification = UploadNotification::parse(payload)?;
        tracing::info!(
            event_name = %notification.event_name,
            key = %notification.object_key,
            file_id = %notification.file_id,
            "Handling storage event"
        );

        let metadata = self.load_file(notification.file_id).await?;
        let info = self.storage.stat_object(&metadata.storage_key).await?;

        let mut cause = None;
        if info.checksum_sha256.as_deref() != Some(metadata.checksum.as_str()) {
            cause = Some(AppError::MismatchChecksum);
        }
        if info.size != metadata.size_bytes {
            cause = Some(AppError::SizeMismatch);
        }

        let head = self
            .storage
            .read_head(&metadata.storage_key, SNIFF_LEN)
            .await?;
        let detected = sniff_content_type(&head);
        let declared = normalize_content_type(&metadata.mime_type)
            .unwrap_or_else(|_| metadata.mime_type.clone());
        if detected != declared {
            tracing::warn!(
                file_id = %metadata.id,
                declared = %declared,
                detected,
                "Content type mismatch"
            );
            return Err(AppError::ContentTypeMismatch {
                declared,
                detected: detected.to_string(),
            });
        }

        self.files
            .finalize_upload(metadata, cause, notification.event_type)
            .await
    }
}

#[async_trait]
impl<U: UnitOfWork> MessageHandler for NotificationService<U> {
    async fn handle_message(&self, payload: &[u8]) -> Result<(), AppError> {
        self.reconcile(payload).await
    }
}
