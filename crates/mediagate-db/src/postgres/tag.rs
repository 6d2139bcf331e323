use async_trait::async_trait;
use mediagate_core::models::Tag;
use mediagate_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use super::PgRepositories;
use crate::repository::TagRepository;

fn tag_from_row(row: &PgRow) -> Result<Tag, AppError> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TagRepository for PgRepositories {
    async fn create_many(&mut self, names: &[String]) -> Result<u64, AppError> {
        if names.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = names.iter().map(|_| Uuid::new_v4()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO tags (id, name)
            SELECT * FROM UNNEST($1::uuid[], $2::text[])
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(names)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Tag, AppError> {
        let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE name = LOWER($1)")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::TagNotFound(name.to_lowercase()))?;

        tag_from_row(&row)
    }

    async fn find_by_names(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, Uuid>, AppError> {
        let rows = sqlx::query("SELECT id, name FROM tags WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| -> Result<(String, Uuid), AppError> {
                Ok((row.try_get("name")?, row.try_get("id")?))
            })
            .collect()
    }

    async fn find_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<Tag>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, name, created_at FROM tags WHERE id = ANY($1) ORDER BY name",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }

    async fn list_after(
        &mut self,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM tags
            WHERE $1::text IS NULL OR name > LOWER($1)
            ORDER BY name
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }
}
