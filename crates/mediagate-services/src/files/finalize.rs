use mediagate_core::models::{EventType, FileMetadata, FileStatus, UploadSessionStatus};
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;

use super::FileService;

impl<U: UnitOfWork> FileService<U> {
    /// Commits the terminal state of an upload.
    ///
    /// Without `cause` the file (and, for multipart uploads, its session) becomes
    /// `completed`. With a cause the file becomes `failed`, is soft-deleted and loses its
    /// tags; the multipart upload is aborted or the stored object deleted. An
    /// `Unknown` event gets no storage cleanup.
    ///
    /// The result only reflects whether this bookkeeping succeeded, not whether the
    /// upload was good.
    #[tracing::instrument(
        skip(self, metadata, cause),
        fields(file_id = %metadata.id, event_type = ?event_type, failed = cause.is_some())
    )]
    pub async fn finalize_upload(
        &self,
        metadata: FileMetadata,
        cause: Option<AppError>,
        event_type: EventType,
    ) -> Result<(), AppError> {
        let file_id = metadata.id;
        let multipart = event_type.is_multipart();

        let session = if multipart {
            let session = self
                .uow
                .execute(move |repos| {
                    Box::pin(async move { repos.sessions().find_active_by_file_id(file_id).await })
                })
                .await?;
            Some(session)
        } else {
            None
        };

        let (file_status, session_status) = match &cause {
            None => (FileStatus::Completed, UploadSessionStatus::Completed),
            Some(cause) => {
                tracing::warn!(cause = %cause, "Upload rejected by reconciliation");
                (FileStatus::Failed, UploadSessionStatus::Aborted)
            }
        };
        let storage = self.storage.clone();

        self.uow
            .execute(move |repos| {
                Box::pin(async move {
                    if multipart {
                        repos
                            .sessions()
                            .update_status_by_file_id(file_id, session_status)
                            .await?;
                    }
                    repos.files().update_status(file_id, file_status).await?;

                    if file_status == FileStatus::Failed {
                        repos.file_tags().delete_by_file_id(file_id).await?;
                        repos.files().soft_delete(file_id).await?;

                        match (event_type, session) {
                            (EventType::MultipartUploadComplete, Some(session)) => {
                                storage
                                    .abort_multipart_upload(
                                        &metadata.storage_key,
                                        &session.provider_upload_id,
                                    )
                                    .await?
                            }
                            (EventType::SimpleUploadComplete, _) => {
                                storage.delete_object(&metadata.storage_key).await?
                            }
                            // Nothing is known about what was stored.
                            _ => {}
                        }
                    }
                    Ok(())
                })
            })
            .await?;

        tracing::info!(status = %file_status, "Upload finalized");
        Ok(())
    }
}
