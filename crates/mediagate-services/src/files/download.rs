use mediagate_core::models::FileStatus;
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use uuid::Uuid;

use super::{FileDownload, FileService};

impl<U: UnitOfWork> FileService<U> {
    /// Download URL and tags of a file. Only `completed` files can be downloaded.
    pub async fn get_file(&self, file_id: Uuid) -> Result<FileDownload, AppError> {
        let (file, tags) = self
            .uow
            .execute(move |repos| {
                Box::pin(async move {
                    let file = repos.files().find_by_id(file_id).await?;
                    match file.status {
                        FileStatus::Uploading => return Err(AppError::FileNotReady),
                        FileStatus::Failed => return Err(AppError::FileUploadFailed),
                        FileStatus::Completed => {}
                    }

                    let tag_ids: Vec<Uuid> = repos
                        .file_tags()
                        .find_by_file_id(file_id)
                        .await?
                        .into_iter()
                        .map(|link| link.tag_id)
                        .collect();
                    let tags = repos.tags().find_by_ids(&tag_ids).await?;
                    Ok((file, tags))
                })
            })
            .await?;

        let request = self
            .storage
            .presign_download(&file.storage_key, self.presign.download)
            .await?;
        if request.url.is_empty() {
            return Err(AppError::Internal("no download url returned".to_string()));
        }

        Ok(FileDownload {
            url: request.url,
            filename: file.filename,
            tags,
            expires_at: request.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{seed_file, Harness};
    use chrono::Duration;
    use mediagate_core::models::FileStatus;
    use mediagate_core::AppError;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_get_file_requires_completed_status() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["nature"]).await;
        let file = seed_file(&h.uow, "a.jpg", "image/jpeg", 4, &tags, Duration::zero()).await;

        let err = h.files.get_file(file.id).await.unwrap_err();
        assert!(matches!(err, AppError::FileNotReady));

        let id = file.id;
        h.uow
            .seed(move |state| {
                if let Some(file) = state.files.get_mut(&id) {
                    file.status = FileStatus::Failed;
                }
            })
            .await;
        let err = h.files.get_file(id).await.unwrap_err();
        assert!(matches!(err, AppError::FileUploadFailed));
    }

    #[tokio::test]
    async fn test_get_file_returns_url_and_tags() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["nature", "sea"]).await;
        let file = seed_file(&h.uow, "a.jpg", "image/jpeg", 4, &tags, Duration::zero()).await;
        let id = file.id;
        h.uow
            .seed(move |state| {
                if let Some(file) = state.files.get_mut(&id) {
                    file.status = FileStatus::Completed;
                }
            })
            .await;

        let download = h.files.get_file(id).await.unwrap();

        assert_eq!(download.filename, "a.jpg");
        assert!(download.url.contains(&file.storage_key));
        let mut names: Vec<_> = download.tags.into_iter().map(|t| t.name).collect();
        names.sort();
        assert_eq!(names, vec!["nature", "sea"]);
    }

    #[tokio::test]
    async fn test_get_file_unknown_id() {
        let h = Harness::new();
        let err = h.files.get_file(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::FileMetadataNotFound));
    }
}
