use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::media_type::{storage_key, MediaType};

/// Lifecycle of an uploaded file. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, FileStatus::Uploading)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(FileStatus::Uploading),
            "completed" => Ok(FileStatus::Completed),
            "failed" => Ok(FileStatus::Failed),
            other => Err(AppError::Internal(format!("unknown file status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    pub storage_key: String,
    /// Declared SHA-256 of the content, as sent by the client (base64).
    pub checksum: String,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Client-declared attributes of a file about to be uploaded.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub tags: Vec<String>,
}

impl FileMetadata {
    /// Fresh `uploading` record keyed under `{media_type}/{id}`.
    pub fn new_uploading(file: &NewFile, mime_type: String, media_type: MediaType) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            filename: file.filename.clone(),
            mime_type,
            media_type,
            size_bytes: file.size_bytes,
            storage_key: storage_key(media_type, id),
            checksum: file.checksum.clone(),
            status: FileStatus::Uploading,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
