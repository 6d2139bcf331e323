use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediagate_core::models::{UploadSession, UploadSessionStatus};
use mediagate_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::PgRepositories;
use crate::repository::UploadSessionRepository;

const SESSION_COLUMNS: &str =
    "id, file_id, provider_upload_id, part_size, expires_at, status, created_at, updated_at";

struct SessionRow(UploadSession);

impl<'r> FromRow<'r, PgRow> for SessionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<UploadSessionStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(SessionRow(UploadSession {
            id: row.try_get("id")?,
            file_id: row.try_get("file_id")?,
            provider_upload_id: row.try_get("provider_upload_id")?,
            part_size: row.try_get("part_size")?,
            expires_at: row.try_get("expires_at")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

impl PgRepositories {
    async fn find_session_where(
        &mut self,
        condition: &str,
        id: Uuid,
    ) -> Result<UploadSession, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM upload_session WHERE {} LIMIT 1",
            SESSION_COLUMNS, condition
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::SessionNotFound)?;

        Ok(row.0)
    }
}

#[async_trait]
impl UploadSessionRepository for PgRepositories {
    async fn create(&mut self, session: &UploadSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO upload_session (
                id, file_id, provider_upload_id, part_size, expires_at, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id)
        .bind(session.file_id)
        .bind(&session.provider_upload_id)
        .bind(session.part_size)
        .bind(session.expires_at)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_by_id(&mut self, id: Uuid) -> Result<UploadSession, AppError> {
        self.find_session_where("id = $1", id).await
    }

    async fn find_active_by_id(&mut self, id: Uuid) -> Result<UploadSession, AppError> {
        self.find_session_where("id = $1 AND status = 'open'", id)
            .await
    }

    async fn find_active_by_file_id(&mut self, file_id: Uuid) -> Result<UploadSession, AppError> {
        self.find_session_where("file_id = $1 AND status = 'open'", file_id)
            .await
    }

    async fn update_expires_at(
        &mut self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE upload_session
            SET expires_at = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'open'
            "#,
        )
        .bind(expires_at)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::SessionNotFound);
        }
        Ok(())
    }

    async fn update_status(
        &mut self,
        id: Uuid,
        status: UploadSessionStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE upload_session SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::SessionNotFound);
        }
        Ok(())
    }

    async fn update_status_by_file_id(
        &mut self,
        file_id: Uuid,
        status: UploadSessionStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE upload_session
            SET status = $1, updated_at = NOW()
            WHERE file_id = $2 AND status = 'open'
            "#,
        )
        .bind(status.as_str())
        .bind(file_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::SessionNotFound);
        }
        Ok(())
    }

    async fn find_all_expired(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UploadSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {}
            FROM upload_session
            WHERE status = 'open' AND expires_at < $1
            ORDER BY expires_at
            "#,
            SESSION_COLUMNS
        ))
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }
}
