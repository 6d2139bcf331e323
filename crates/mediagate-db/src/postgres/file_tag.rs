use async_trait::async_trait;
use mediagate_core::models::FileTag;
use mediagate_core::AppError;
use sqlx::Row;
use uuid::Uuid;

use super::PgRepositories;
use crate::repository::FileTagRepository;

#[async_trait]
impl FileTagRepository for PgRepositories {
    async fn create_many(&mut self, file_id: Uuid, tag_ids: &[Uuid]) -> Result<u64, AppError> {
        if tag_ids.is_empty() {
            return Ok(0);
        }
        let mut unique = tag_ids.to_vec();
        unique.sort();
        unique.dedup();

        let result = sqlx::query(
            r#"
            INSERT INTO file_metadata_tags (file_id, tag_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT (file_id, tag_id) DO NOTHING
            "#,
        )
        .bind(file_id)
        .bind(&unique)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_file_id(&mut self, file_id: Uuid) -> Result<Vec<FileTag>, AppError> {
        let rows = sqlx::query("SELECT file_id, tag_id FROM file_metadata_tags WHERE file_id = $1")
            .bind(file_id)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| -> Result<FileTag, AppError> {
                Ok(FileTag {
                    file_id: row.try_get("file_id")?,
                    tag_id: row.try_get("tag_id")?,
                })
            })
            .collect()
    }

    async fn delete_by_file_id(&mut self, file_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM file_metadata_tags WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}
