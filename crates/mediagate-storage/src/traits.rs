//! Storage abstraction trait
//!
//! This module defines the FileStorage trait that all object storage backends implement.

use async_trait::async_trait;
use bytes::Bytes;
use mediagate_core::models::{PartsPage, PresignedRequest, UploadPart};
use mediagate_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Multipart operation failed: {0}")]
    MultipartFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// What storage reports about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: i64,
    /// Checksum recorded as user metadata at upload time, if any.
    pub checksum_sha256: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Object storage capability used by the upload engine.
///
/// Part bookkeeping is never duplicated locally: `list_parts` is the source of truth
/// for what a multipart upload contains.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Presigned PUT for a single-shot upload, bound to the declared SHA-256.
    async fn presign_simple_upload(
        &self,
        key: &str,
        checksum_sha256: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest>;

    /// Start a multipart upload and return the provider's upload id.
    async fn init_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        checksum_sha256: &str,
    ) -> StorageResult<String>;

    /// Presigned PUT for one part of a multipart upload.
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        checksum_sha256: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest>;

    /// One page of the parts storage holds for `upload_id`, starting after `marker`.
    async fn list_parts(
        &self,
        key: &str,
        upload_id: &str,
        max_parts: i32,
        marker: i32,
    ) -> StorageResult<PartsPage>;

    /// Assemble the object. Implementations sort parts by number and strip ETag quotes.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadPart>,
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    async fn stat_object(&self, key: &str) -> StorageResult<ObjectInfo>;

    /// First `len` bytes of the object (fewer if the object is shorter).
    async fn read_head(&self, key: &str, len: usize) -> StorageResult<Bytes>;

    /// Presigned GET for downloading the object.
    async fn presign_download(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest>;
}
