//! In-process unit of work
//!
//! Each `execute` works on a copy of the state and publishes it only when the body
//! returns `Ok`, which gives the same commit/rollback behavior as the PostgreSQL adapter.
//! Transactions are serialized by a single lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use mediagate_core::models::{
    FileMetadata, FileStatus, FileTag, Tag, UploadSession, UploadSessionStatus,
};
use mediagate_core::AppError;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repository::{
    FileRepository, FileTagRepository, Repositories, TagRepository, TxFuture, UnitOfWork,
    UploadSessionRepository,
};

/// Committed rows, keyed the way the tables are.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub files: HashMap<Uuid, FileMetadata>,
    pub sessions: HashMap<Uuid, UploadSession>,
    /// Keyed by lowercase name.
    pub tags: BTreeMap<String, Tag>,
    pub file_tags: BTreeSet<FileTag>,
}

impl MemoryState {
    pub fn tags_of(&self, file_id: Uuid) -> Vec<Uuid> {
        self.file_tags
            .iter()
            .filter(|link| link.file_id == file_id)
            .map(|link| link.tag_id)
            .collect()
    }
}

pub struct MemoryRepositories {
    state: MemoryState,
    failing: HashSet<&'static str>,
}

#[derive(Default)]
pub struct MemoryUnitOfWork {
    state: Mutex<MemoryState>,
    commits: std::sync::atomic::AtomicUsize,
    failing: std::sync::Mutex<HashSet<&'static str>>,
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: Mutex::new(state),
            commits: Default::default(),
            failing: Default::default(),
        }
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Mutate committed state directly, outside any transaction.
    pub async fn seed<F>(&self, f: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        f(&mut *self.state.lock().await);
    }

    /// Create tags directly, returning their ids in input order.
    pub async fn seed_tags(&self, names: &[&str]) -> Vec<Uuid> {
        let mut state = self.state.lock().await;
        names
            .iter()
            .map(|name| {
                let name = name.to_lowercase();
                state
                    .tags
                    .entry(name.clone())
                    .or_insert_with(|| Tag {
                        id: Uuid::new_v4(),
                        name,
                        created_at: Utc::now(),
                    })
                    .id
            })
            .collect()
    }

    /// Make every later call of `operation` (e.g. `"sessions.find_active_by_file_id"`)
    /// fail with an internal error.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(operation);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn execute<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: for<'tx> FnOnce(&'tx mut dyn Repositories) -> TxFuture<'tx, T> + Send + 'static,
    {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let mut committed = self.state.lock().await;
        let mut repos = MemoryRepositories {
            state: committed.clone(),
            failing,
        };

        let outcome = AssertUnwindSafe(f(&mut repos)).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                *committed = repos.state;
                self.commits
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(value)
            }
            Ok(Err(err)) => Err(err),
            Err(panic) => {
                drop(committed);
                std::panic::resume_unwind(panic)
            }
        }
    }
}

impl Repositories for MemoryRepositories {
    fn tags(&mut self) -> &mut dyn TagRepository {
        self
    }

    fn files(&mut self) -> &mut dyn FileRepository {
        self
    }

    fn sessions(&mut self) -> &mut dyn UploadSessionRepository {
        self
    }

    fn file_tags(&mut self) -> &mut dyn FileTagRepository {
        self
    }
}

#[async_trait]
impl TagRepository for MemoryRepositories {
    async fn create_many(&mut self, names: &[String]) -> Result<u64, AppError> {
        let mut created = 0;
        for name in names {
            if self.state.tags.contains_key(name) {
                continue;
            }
            self.state.tags.insert(
                name.clone(),
                Tag {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    created_at: Utc::now(),
                },
            );
            created += 1;
        }
        Ok(created)
    }

    async fn find_by_name(&mut self, name: &str) -> Result<Tag, AppError> {
        let name = name.to_lowercase();
        self.state
            .tags
            .get(&name)
            .cloned()
            .ok_or(AppError::TagNotFound(name))
    }

    async fn find_by_names(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, Uuid>, AppError> {
        Ok(names
            .iter()
            .filter_map(|name| {
                self.state
                    .tags
                    .get(name)
                    .map(|tag| (tag.name.clone(), tag.id))
            })
            .collect())
    }

    async fn find_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<Tag>, AppError> {
        Ok(self
            .state
            .tags
            .values()
            .filter(|tag| ids.contains(&tag.id))
            .cloned()
            .collect())
    }

    async fn list_after(&mut self, after: Option<&str>, limit: i64) -> Result<Vec<Tag>, AppError> {
        let after = after.map(str::to_lowercase);
        Ok(self
            .state
            .tags
            .values()
            .filter(|tag| after.as_deref().map_or(true, |after| tag.name.as_str() > after))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FileRepository for MemoryRepositories {
    async fn create(&mut self, file: &FileMetadata) -> Result<(), AppError> {
        if self.state.files.contains_key(&file.id) {
            return Err(AppError::AlreadyExists);
        }
        self.state.files.insert(file.id, file.clone());
        Ok(())
    }

    async fn find_by_id(&mut self, id: Uuid) -> Result<FileMetadata, AppError> {
        self.state
            .files
            .get(&id)
            .filter(|file| file.deleted_at.is_none())
            .cloned()
            .ok_or(AppError::FileMetadataNotFound)
    }

    async fn update_status(&mut self, id: Uuid, status: FileStatus) -> Result<(), AppError> {
        let file = self
            .state
            .files
            .get_mut(&id)
            .ok_or(AppError::FileMetadataNotFound)?;
        file.status = status;
        file.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&mut self, id: Uuid) -> Result<(), AppError> {
        let file = self
            .state
            .files
            .get_mut(&id)
            .ok_or(AppError::FileMetadataNotFound)?;
        let now = Utc::now();
        file.deleted_at = Some(now);
        file.updated_at = now;
        Ok(())
    }

    async fn find_expired(&mut self, before: DateTime<Utc>) -> Result<Vec<FileMetadata>, AppError> {
        let mut expired: Vec<FileMetadata> = self
            .state
            .files
            .values()
            .filter(|file| {
                file.status == FileStatus::Uploading
                    && file.updated_at < before
                    && file.deleted_at.is_none()
            })
            .cloned()
            .collect();
        expired.sort_by_key(|file| file.updated_at);
        Ok(expired)
    }
}

impl MemoryRepositories {
    fn check_failing(&self, operation: &'static str) -> Result<(), AppError> {
        if self.failing.contains(operation) {
            return Err(AppError::Internal(format!("injected failure in {}", operation)));
        }
        Ok(())
    }

    fn find_session<P>(&self, predicate: P) -> Result<UploadSession, AppError>
    where
        P: Fn(&UploadSession) -> bool,
    {
        self.state
            .sessions
            .values()
            .find(|session| predicate(session))
            .cloned()
            .ok_or(AppError::SessionNotFound)
    }
}

#[async_trait]
impl UploadSessionRepository for MemoryRepositories {
    async fn create(&mut self, session: &UploadSession) -> Result<(), AppError> {
        if !self.state.files.contains_key(&session.file_id) {
            return Err(AppError::FileMetadataNotFound);
        }
        let open_exists = self.state.sessions.values().any(|existing| {
            existing.file_id == session.file_id && existing.status == UploadSessionStatus::Open
        });
        if open_exists && session.status == UploadSessionStatus::Open {
            return Err(AppError::AlreadyExists);
        }
        self.state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&mut self, id: Uuid) -> Result<UploadSession, AppError> {
        self.find_session(|session| session.id == id)
    }

    async fn find_active_by_id(&mut self, id: Uuid) -> Result<UploadSession, AppError> {
        self.find_session(|session| {
            session.id == id && session.status == UploadSessionStatus::Open
        })
    }

    async fn find_active_by_file_id(&mut self, file_id: Uuid) -> Result<UploadSession, AppError> {
        self.check_failing("sessions.find_active_by_file_id")?;
        self.find_session(|session| {
            session.file_id == file_id && session.status == UploadSessionStatus::Open
        })
    }

    async fn update_expires_at(
        &mut self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let session = self
            .state
            .sessions
            .get_mut(&id)
            .filter(|session| session.status == UploadSessionStatus::Open)
            .ok_or(AppError::SessionNotFound)?;
        session.expires_at = expires_at;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(
        &mut self,
        id: Uuid,
        status: UploadSessionStatus,
    ) -> Result<(), AppError> {
        let session = self
            .state
            .sessions
            .get_mut(&id)
            .ok_or(AppError::SessionNotFound)?;
        session.status = status;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status_by_file_id(
        &mut self,
        file_id: Uuid,
        status: UploadSessionStatus,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut updated = 0;
        for session in self.state.sessions.values_mut().filter(|session| {
            session.file_id == file_id && session.status == UploadSessionStatus::Open
        }) {
            session.status = status;
            session.updated_at = now;
            updated += 1;
        }
        if updated == 0 {
            return Err(AppError::SessionNotFound);
        }
        Ok(())
    }

    async fn find_all_expired(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UploadSession>, AppError> {
        let mut expired: Vec<UploadSession> = self
            .state
            .sessions
            .values()
            .filter(|session| {
                session.status == UploadSessionStatus::Open && session.expires_at < now
            })
            .cloned()
            .collect();
        expired.sort_by_key(|session| session.expires_at);
        Ok(expired)
    }
}

#[async_trait]
impl FileTagRepository for MemoryRepositories {
    async fn create_many(&mut self, file_id: Uuid, tag_ids: &[Uuid]) -> Result<u64, AppError> {
        if !self.state.files.contains_key(&file_id) {
            return Err(AppError::FileMetadataNotFound);
        }
        let mut created = 0;
        for &tag_id in tag_ids {
            if !self.state.tags.values().any(|tag| tag.id == tag_id) {
                return Err(AppError::TagNotFound(tag_id.to_string()));
            }
            if self.state.file_tags.insert(FileTag { file_id, tag_id }) {
                created += 1;
            }
        }
        Ok(created)
    }

    async fn find_by_file_id(&mut self, file_id: Uuid) -> Result<Vec<FileTag>, AppError> {
        Ok(self
            .state
            .file_tags
            .iter()
            .filter(|link| link.file_id == file_id)
            .copied()
            .collect())
    }

    async fn delete_by_file_id(&mut self, file_id: Uuid) -> Result<u64, AppError> {
        let before = self.state.file_tags.len();
        self.state.file_tags.retain(|link| link.file_id != file_id);
        Ok((before - self.state.file_tags.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediagate_core::models::NewFile;
    use mediagate_core::MediaType;

    fn sample_file() -> FileMetadata {
        let new_file = NewFile {
            filename: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 2048,
            checksum: "sum".to_string(),
            tags: vec!["nature".to_string()],
        };
        FileMetadata::new_uploading(&new_file, "image/jpeg".to_string(), MediaType::Image)
    }

    #[tokio::test]
    async fn test_execute_commits_on_ok() {
        let uow = MemoryUnitOfWork::new();
        let file = sample_file();
        let id = file.id;

        uow.execute(move |repos| {
            Box::pin(async move {
                repos.files().create(&file).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        assert!(uow.snapshot().await.files.contains_key(&id));
        assert_eq!(uow.commits(), 1);
    }

    #[tokio::test]
    async fn test_execute_rolls_back_on_err() {
        let uow = MemoryUnitOfWork::new();
        let file = sample_file();
        let id = file.id;

        let err = uow
            .execute(move |repos| {
                Box::pin(async move {
                    repos.files().create(&file).await?;
                    repos
                        .tags()
                        .find_by_name("missing")
                        .await
                        .map(|_| ())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TagNotFound(name) if name == "missing"));
        assert!(!uow.snapshot().await.files.contains_key(&id));
        assert_eq!(uow.commits(), 0);
    }

    #[tokio::test]
    async fn test_execute_resumes_panic_without_committing() {
        let uow = std::sync::Arc::new(MemoryUnitOfWork::new());
        let file = sample_file();
        let id = file.id;

        let task_uow = uow.clone();
        let joined = tokio::spawn(async move {
            task_uow
                .execute(move |repos| {
                    Box::pin(async move {
                        repos.files().create(&file).await?;
                        if file.size_bytes > 0 {
                            panic!("boom");
                        }
                        Ok(())
                    })
                })
                .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert!(!uow.snapshot().await.files.contains_key(&id));
    }

    #[tokio::test]
    async fn test_soft_deleted_file_is_invisible() {
        let uow = MemoryUnitOfWork::new();
        let file = sample_file();
        let id = file.id;
        uow.seed(move |state| {
            state.files.insert(file.id, file);
        })
        .await;

        let err = uow
            .execute(move |repos| {
                Box::pin(async move {
                    repos.files().soft_delete(id).await?;
                    repos.files().find_by_id(id).await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::FileMetadataNotFound));
    }

    #[tokio::test]
    async fn test_list_after_is_exclusive_and_ordered() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_tags(&["sport", "Nature", "art", "music"]).await;

        let tags = uow
            .execute(|repos| Box::pin(async move { repos.tags().list_after(Some("Music"), 10).await }))
            .await
            .unwrap();

        let names: Vec<_> = tags.into_iter().map(|tag| tag.name).collect();
        assert_eq!(names, vec!["nature", "sport"]);
    }

    #[tokio::test]
    async fn test_update_expires_at_requires_open_session() {
        let uow = MemoryUnitOfWork::new();
        let file = sample_file();
        let mut session = UploadSession::open(file.id, "upload-1".to_string(), 10, Utc::now());
        session.status = UploadSessionStatus::Aborted;
        let session_id = session.id;
        uow.seed(move |state| {
            state.files.insert(file.id, file);
            state.sessions.insert(session.id, session);
        })
        .await;

        let err = uow
            .execute(move |repos| {
                Box::pin(async move {
                    repos
                        .sessions()
                        .update_expires_at(session_id, Utc::now())
                        .await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_fail_on_injects_repository_error() {
        let uow = MemoryUnitOfWork::new();
        uow.fail_on("sessions.find_active_by_file_id");

        let err = uow
            .execute(move |repos| {
                Box::pin(async move {
                    repos
                        .sessions()
                        .find_active_by_file_id(Uuid::new_v4())
                        .await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(msg) if msg.contains("find_active_by_file_id")));
    }
}
