use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediagate_core::models::{FileMetadata, FileStatus};
use mediagate_core::{AppError, MediaType};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::PgRepositories;
use crate::repository::FileRepository;

const FILE_COLUMNS: &str = "id, filename, mime_type, file_type, size_bytes, storage_key, \
                            checksum, status, created_at, updated_at, deleted_at";

fn file_from_row(row: &PgRow) -> Result<FileMetadata, AppError> {
    let media_type: String = row.try_get("file_type")?;
    let status: String = row.try_get("status")?;

    Ok(FileMetadata {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        mime_type: row.try_get("mime_type")?,
        media_type: media_type
            .parse::<MediaType>()
            .map_err(|e| AppError::Internal(e.to_string()))?,
        size_bytes: row.try_get("size_bytes")?,
        storage_key: row.try_get("storage_key")?,
        checksum: row.try_get("checksum")?,
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait]
impl FileRepository for PgRepositories {
    async fn create(&mut self, file: &FileMetadata) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO file_metadata (
                id, filename, mime_type, file_type, size_bytes, storage_key,
                checksum, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(file.id)
        .bind(&file.filename)
        .bind(&file.mime_type)
        .bind(file.media_type.as_str())
        .bind(file.size_bytes)
        .bind(&file.storage_key)
        .bind(&file.checksum)
        .bind(file.status.as_str())
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_by_id(&mut self, id: Uuid) -> Result<FileMetadata, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM file_metadata WHERE id = $1 AND deleted_at IS NULL",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::FileMetadataNotFound)?;

        file_from_row(&row)
    }

    async fn update_status(&mut self, id: Uuid, status: FileStatus) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE file_metadata
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::FileMetadataNotFound);
        }
        Ok(())
    }

    async fn soft_delete(&mut self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE file_metadata
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::FileMetadataNotFound);
        }
        Ok(())
    }

    async fn find_expired(&mut self, before: DateTime<Utc>) -> Result<Vec<FileMetadata>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM file_metadata
            WHERE status = 'uploading' AND updated_at < $1 AND deleted_at IS NULL
            ORDER BY updated_at
            "#,
            FILE_COLUMNS
        ))
        .bind(before)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(file_from_row).collect()
    }
}
