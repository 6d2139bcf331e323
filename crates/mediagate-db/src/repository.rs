//! Repository contracts and the unit of work that scopes them
//!
//! Every repository call runs inside a transaction opened by [`UnitOfWork::execute`].
//! The closure receives a [`Repositories`] view bound to that transaction; it cannot reach
//! the unit of work itself, so nested transactions are impossible by construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediagate_core::models::{
    FileMetadata, FileStatus, FileTag, Tag, UploadSession, UploadSessionStatus,
};
use mediagate_core::AppError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// Future returned by a transaction body, borrowing the transaction for `'tx`.
pub type TxFuture<'tx, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'tx>>;

#[async_trait]
pub trait TagRepository: Send {
    /// Inserts names that do not exist yet and returns how many rows were created.
    /// Names are expected lowercase and deduplicated.
    async fn create_many(&mut self, names: &[String]) -> Result<u64, AppError>;

    async fn find_by_name(&mut self, name: &str) -> Result<Tag, AppError>;

    /// Lowercase name to id, for the names that exist.
    async fn find_by_names(&mut self, names: &[String]) -> Result<HashMap<String, Uuid>, AppError>;

    async fn find_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<Tag>, AppError>;

    /// Up to `limit` tags with a name strictly greater than `after`, ascending.
    async fn list_after(&mut self, after: Option<&str>, limit: i64) -> Result<Vec<Tag>, AppError>;
}

#[async_trait]
pub trait FileRepository: Send {
    async fn create(&mut self, file: &FileMetadata) -> Result<(), AppError>;

    /// Soft-deleted rows are invisible.
    async fn find_by_id(&mut self, id: Uuid) -> Result<FileMetadata, AppError>;

    async fn update_status(&mut self, id: Uuid, status: FileStatus) -> Result<(), AppError>;

    async fn soft_delete(&mut self, id: Uuid) -> Result<(), AppError>;

    /// Files still `uploading` whose last update is older than `before`.
    async fn find_expired(&mut self, before: DateTime<Utc>) -> Result<Vec<FileMetadata>, AppError>;
}

#[async_trait]
pub trait UploadSessionRepository: Send {
    async fn create(&mut self, session: &UploadSession) -> Result<(), AppError>;

    async fn find_by_id(&mut self, id: Uuid) -> Result<UploadSession, AppError>;

    async fn find_active_by_id(&mut self, id: Uuid) -> Result<UploadSession, AppError>;

    async fn find_active_by_file_id(&mut self, file_id: Uuid) -> Result<UploadSession, AppError>;

    /// Slides the TTL of an open session; `SessionNotFound` otherwise.
    async fn update_expires_at(
        &mut self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn update_status(&mut self, id: Uuid, status: UploadSessionStatus)
        -> Result<(), AppError>;

    /// Moves the open session(s) of a file to `status`.
    async fn update_status_by_file_id(
        &mut self,
        file_id: Uuid,
        status: UploadSessionStatus,
    ) -> Result<(), AppError>;

    /// Open sessions whose `expires_at` is before `now`.
    async fn find_all_expired(&mut self, now: DateTime<Utc>)
        -> Result<Vec<UploadSession>, AppError>;
}

#[async_trait]
pub trait FileTagRepository: Send {
    /// Links a file to tags, ignoring links that already exist.
    async fn create_many(&mut self, file_id: Uuid, tag_ids: &[Uuid]) -> Result<u64, AppError>;

    async fn find_by_file_id(&mut self, file_id: Uuid) -> Result<Vec<FileTag>, AppError>;

    async fn delete_by_file_id(&mut self, file_id: Uuid) -> Result<u64, AppError>;
}

/// Transaction-scoped view over the four repositories.
pub trait Repositories: Send {
    fn tags(&mut self) -> &mut dyn TagRepository;
    fn files(&mut self) -> &mut dyn FileRepository;
    fn sessions(&mut self) -> &mut dyn UploadSessionRepository;
    fn file_tags(&mut self) -> &mut dyn FileTagRepository;
}

/// Transactional boundary.
///
/// `execute` commits when the body returns `Ok`, rolls back when it returns `Err`, and
/// rolls back then resumes the panic when the body panics.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    async fn execute<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: for<'tx> FnOnce(&'tx mut dyn Repositories) -> TxFuture<'tx, T> + Send + 'static;
}
