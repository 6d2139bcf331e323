use mediagate_core::media_type::normalize_content_type;
use mediagate_core::models::{FileMetadata, NewFile, UploadSession};
use mediagate_core::{classify, AppError, MediaType};
use mediagate_db::UnitOfWork;

use super::{FileService, MultipartUploadTicket, UploadTicket};
use crate::tags::resolve_tag_ids;

/// Checks the (filename, content type) pair against the allowlist.
/// Returns the media type and the bare MIME type to store.
fn validate_media(file: &NewFile) -> Result<(MediaType, String), AppError> {
    let media_type = classify(&file.filename, &file.mime_type)?;
    let mime_type = normalize_content_type(&file.mime_type)?;
    Ok((media_type, mime_type))
}

fn require_tags(file: &NewFile) -> Result<(), AppError> {
    if file.tags.iter().all(|tag| tag.trim().is_empty()) {
        return Err(AppError::InvalidInput(
            "at least one tag is required".to_string(),
        ));
    }
    Ok(())
}

impl<U: UnitOfWork> FileService<U> {
    /// Registers a file uploaded in one request and returns a presigned PUT bound to its
    /// checksum. The file row, its tags and the URL are produced in one transaction.
    #[tracing::instrument(
        skip(self, file),
        fields(filename = %file.filename, size_bytes = file.size_bytes)
    )]
    pub async fn request_upload_file(&self, file: NewFile) -> Result<UploadTicket, AppError> {
        if file.size_bytes > self.upload.single_upload_max_bytes {
            return Err(AppError::FileSizeTooBig);
        }
        let (media_type, mime_type) = validate_media(&file)?;
        require_tags(&file)?;

        let metadata = FileMetadata::new_uploading(&file, mime_type, media_type);
        let file_id = metadata.id;
        let tags = file.tags;
        let storage = self.storage.clone();
        let expires_in = self.presign.simple_upload;

        let request = self
            .uow
            .execute(move |repos| {
                Box::pin(async move {
                    repos.files().create(&metadata).await?;
                    let tag_ids = resolve_tag_ids(repos.tags(), &tags).await?;
                    repos.file_tags().create_many(metadata.id, &tag_ids).await?;

                    let request = storage
                        .presign_simple_upload(&metadata.storage_key, &metadata.checksum, expires_in)
                        .await?;
                    Ok(request)
                })
            })
            .await?;

        tracing::info!(file_id = %file_id, "Simple upload requested");

        Ok(UploadTicket {
            file_id,
            url: request.url,
            headers: request.headers,
            expires_at: request.expires_at,
        })
    }

    /// Starts a multipart upload at storage, then records the file, its tags and an open
    /// session. When any database step fails the storage upload is aborted again.
    #[tracing::instrument(
        skip(self, file),
        fields(filename = %file.filename, size_bytes = file.size_bytes)
    )]
    pub async fn request_upload_multipart_file(
        &self,
        file: NewFile,
    ) -> Result<MultipartUploadTicket, AppError> {
        if file.size_bytes <= self.upload.single_upload_max_bytes {
            return Err(AppError::FileSizeTooSmall);
        }
        if file.size_bytes > self.upload.multipart_upload_max_bytes {
            return Err(AppError::FileSizeTooBig);
        }
        let (media_type, mime_type) = validate_media(&file)?;
        require_tags(&file)?;

        let metadata = FileMetadata::new_uploading(&file, mime_type, media_type);
        let tags = file.tags;
        let storage = self.storage.clone();
        let part_size = self.upload.part_size_bytes;
        let expires_at = self.session_deadline()?;

        let session = self
            .uow
            .execute(move |repos| {
                Box::pin(async move {
                    let upload_id = storage
                        .init_multipart_upload(
                            &metadata.storage_key,
                            &metadata.mime_type,
                            &metadata.checksum,
                        )
                        .await?;

                    let session =
                        UploadSession::open(metadata.id, upload_id.clone(), part_size, expires_at);
                    let recorded: Result<(), AppError> = async {
                        repos.files().create(&metadata).await?;
                        let tag_ids = resolve_tag_ids(repos.tags(), &tags).await?;
                        repos.file_tags().create_many(metadata.id, &tag_ids).await?;
                        repos.sessions().create(&session).await?;
                        Ok(())
                    }
                    .await;

                    if let Err(err) = recorded {
                        if let Err(abort_err) = storage
                            .abort_multipart_upload(&metadata.storage_key, &upload_id)
                            .await
                        {
                            tracing::warn!(
                                error = %abort_err,
                                storage_key = %metadata.storage_key,
                                "Failed to abort multipart upload after rejected request"
                            );
                        }
                        return Err(err);
                    }
                    Ok(session)
                })
            })
            .await?;

        tracing::info!(
            file_id = %session.file_id,
            session_id = %session.id,
            "Multipart upload requested"
        );

        Ok(MultipartUploadTicket {
            session_id: session.id,
            part_size: session.part_size,
        })
    }
}
