use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// `Open` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadSessionStatus {
    Open,
    Completed,
    Aborted,
}

impl UploadSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSessionStatus::Open => "open",
            UploadSessionStatus::Completed => "completed",
            UploadSessionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for UploadSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadSessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(UploadSessionStatus::Open),
            "completed" => Ok(UploadSessionStatus::Completed),
            "aborted" => Ok(UploadSessionStatus::Aborted),
            other => Err(AppError::Internal(format!(
                "unknown upload session status: {}",
                other
            ))),
        }
    }
}

/// Multipart upload session. Which parts exist is only known to object storage,
/// through `provider_upload_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    pub file_id: Uuid,
    pub provider_upload_id: String,
    pub part_size: i64,
    pub expires_at: DateTime<Utc>,
    pub status: UploadSessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn open(
        file_id: Uuid,
        provider_upload_id: String,
        part_size: i64,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_id,
            provider_upload_id,
            part_size,
            expires_at,
            status: UploadSessionStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}
