use chrono::{DateTime, Utc};
use mediagate_core::models::{FileMetadata, FileStatus, UploadSession, UploadSessionStatus};
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use mediagate_storage::FileStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::files::to_chrono;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub failed: usize,
}

/// Rolls back uploads that were abandoned: open sessions past their expiry, and files
/// still `uploading` long after their last update.
pub struct CleanupService<U> {
    uow: Arc<U>,
    storage: Arc<dyn FileStorage>,
    /// How long a file may stay `uploading` without an update.
    stale_after: Duration,
    shutdown: CancellationToken,
}

impl<U: UnitOfWork> CleanupService<U> {
    pub fn new(
        uow: Arc<U>,
        storage: Arc<dyn FileStorage>,
        stale_after: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            uow,
            storage,
            stale_after,
            shutdown,
        }
    }

    /// Start the background sweeps, one round every `period`.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_secs = period.as_secs(), "Cleanup scheduler started");

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        tracing::info!("Cleanup scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_once(Utc::now()).await;
                    }
                }
            }
        })
    }

    /// Both sweeps, sessions first.
    pub async fn run_once(&self, now: DateTime<Utc>) {
        tracing::info!("Starting scheduled cleanup");

        if let Err(e) = self.cleanup_expired_sessions(now).await {
            tracing::error!(error = %e, "Expired sessions sweep failed");
        }
        if let Err(e) = self.cleanup_expired_files(now).await {
            tracing::error!(error = %e, "Expired files sweep failed");
        }
    }

    /// Aborts every open session that expired before `now`, failing its file.
    ///
    /// A session whose file cannot be loaded stops the sweep. A failed transaction is
    /// logged and the sweep moves on.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expired_sessions"))]
    pub async fn cleanup_expired_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, AppError> {
        let sessions = self
            .uow
            .execute(move |repos| Box::pin(async move { repos.sessions().find_all_expired(now).await }))
            .await?;

        let mut report = SweepReport::default();
        for session in sessions {
            if self.shutdown.is_cancelled() {
                tracing::info!("Cleanup cancelled, stopping sweep");
                break;
            }

            let file_id = session.file_id;
            let file = self
                .uow
                .execute(move |repos| Box::pin(async move { repos.files().find_by_id(file_id).await }))
                .await?;

            tracing::info!(
                session_id = %session.id,
                file_id = %file.id,
                expires_at = %session.expires_at,
                "Aborting expired upload session"
            );

            match self.fail_upload(file, Some(session)).await {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, file_id = %file_id, "Failed to abort expired session");
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            "Expired sessions sweep completed"
        );
        Ok(report)
    }

    /// Fails every file still `uploading` whose last update is older than the stale
    /// threshold, aborting its multipart upload or deleting its object.
    ///
    /// A file whose open session has not expired yet is skipped. A session lookup error
    /// other than `SessionNotFound` stops the sweep.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expired_files"))]
    pub async fn cleanup_expired_files(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let before = now - to_chrono(self.stale_after)?;
        let files = self
            .uow
            .execute(move |repos| Box::pin(async move { repos.files().find_expired(before).await }))
            .await?;

        let mut report = SweepReport::default();
        for file in files {
            if self.shutdown.is_cancelled() {
                tracing::info!("Cleanup cancelled, stopping sweep");
                break;
            }

            let file_id = file.id;
            let lookup = self
                .uow
                .execute(move |repos| {
                    Box::pin(async move { repos.sessions().find_active_by_file_id(file_id).await })
                })
                .await;
            let session = match lookup {
                Ok(session) => Some(session),
                Err(AppError::SessionNotFound) => None,
                Err(e) => return Err(e),
            };
            if let Some(session) = session.as_ref().filter(|s| s.expires_at >= now) {
                tracing::debug!(
                    file_id = %file_id,
                    session_id = %session.id,
                    expires_at = %session.expires_at,
                    "Skipping stale file with a live upload session"
                );
                continue;
            }

            tracing::info!(
                file_id = %file_id,
                storage_key = %file.storage_key,
                multipart = session.is_some(),
                "Failing stale upload"
            );

            match self.fail_upload(file, session).await {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, file_id = %file_id, "Failed to clean up stale file");
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            "Expired files sweep completed"
        );
        Ok(report)
    }

    /// One transaction: file failed, soft-deleted and untagged; session aborted; storage
    /// side released.
    async fn fail_upload(
        &self,
        file: FileMetadata,
        session: Option<UploadSession>,
    ) -> Result<(), AppError> {
        let storage = self.storage.clone();
        self.uow
            .execute(move |repos| {
                Box::pin(async move {
                    repos.files().update_status(file.id, FileStatus::Failed).await?;
                    repos.files().soft_delete(file.id).await?;
                    repos.file_tags().delete_by_file_id(file.id).await?;

                    match session {
                        Some(session) => {
                            repos
                                .sessions()
                                .update_status(session.id, UploadSessionStatus::Aborted)
                                .await?;
                            storage
                                .abort_multipart_upload(
                                    &file.storage_key,
                                    &session.provider_upload_id,
                                )
                                .await?;
                        }
                        None => storage.delete_object(&file.storage_key).await?,
                    }
                    Ok(())
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_file, seed_session, Harness, CHECKSUM};
    use chrono::Duration as ChronoDuration;
    use mediagate_db::MemoryUnitOfWork;

    fn cleanup(h: &Harness) -> CleanupService<MemoryUnitOfWork> {
        CleanupService::new(
            h.uow.clone(),
            h.storage.clone(),
            Duration::from_secs(30 * 60),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_expired_session_is_aborted() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["sport"]).await;
        let file = seed_file(&h.uow, "c.mp4", "video/mp4", 64, &tags, ChronoDuration::hours(3)).await;
        let upload_id = h
            .storage
            .init_multipart_upload(&file.storage_key, "video/mp4", CHECKSUM)
            .await
            .unwrap();
        let session = seed_session(&h.uow, &file, &upload_id, -ChronoDuration::hours(2)).await;

        let report = cleanup(&h).cleanup_expired_sessions(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport { processed: 1, failed: 0 });
        let state = h.uow.snapshot().await;
        let stored = &state.files[&file.id];
        assert_eq!(stored.status, FileStatus::Failed);
        assert!(stored.deleted_at.is_some());
        assert!(state.tags_of(file.id).is_empty());
        assert_eq!(state.sessions[&session.id].status, UploadSessionStatus::Aborted);
        assert_eq!(h.storage.abort_calls(), 1);
        assert!(!h.storage.has_upload(&upload_id));
    }

    #[tokio::test]
    async fn test_live_session_is_left_alone() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["sport"]).await;
        let file = seed_file(&h.uow, "c.mp4", "video/mp4", 64, &tags, ChronoDuration::zero()).await;
        seed_session(&h.uow, &file, "upload-1", ChronoDuration::minutes(20)).await;

        let report = cleanup(&h).cleanup_expired_sessions(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert_eq!(h.storage.abort_calls(), 0);
    }

    #[tokio::test]
    async fn test_session_sweep_continues_after_failure() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["sport"]).await;
        let broken = seed_file(&h.uow, "a.mp4", "video/mp4", 64, &tags, ChronoDuration::hours(3)).await;
        seed_session(&h.uow, &broken, "gone", -ChronoDuration::hours(3)).await;
        let healthy = seed_file(&h.uow, "b.mp4", "video/mp4", 64, &tags, ChronoDuration::hours(3)).await;
        let upload_id = h
            .storage
            .init_multipart_upload(&healthy.storage_key, "video/mp4", CHECKSUM)
            .await
            .unwrap();
        seed_session(&h.uow, &healthy, &upload_id, -ChronoDuration::hours(2)).await;

        let report = cleanup(&h).cleanup_expired_sessions(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport { processed: 1, failed: 1 });
        let state = h.uow.snapshot().await;
        assert_eq!(state.files[&broken.id].status, FileStatus::Uploading);
        assert_eq!(state.files[&healthy.id].status, FileStatus::Failed);
    }

    #[tokio::test]
    async fn test_stale_simple_upload_deletes_object() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["nature"]).await;
        let file = seed_file(&h.uow, "a.jpg", "image/jpeg", 4, &tags, ChronoDuration::hours(1)).await;
        h.storage.put_object(&file.storage_key, &b"data"[..], None);

        let report = cleanup(&h).cleanup_expired_files(Utc::now()).await.unwrap();

        assert_eq!(report.processed, 1);
        let state = h.uow.snapshot().await;
        assert_eq!(state.files[&file.id].status, FileStatus::Failed);
        assert!(state.files[&file.id].deleted_at.is_some());
        assert!(state.tags_of(file.id).is_empty());
        assert!(!h.storage.has_object(&file.storage_key));
        assert_eq!(h.storage.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_file_with_live_session_survives_both_sweeps() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["sport"]).await;
        let file = seed_file(&h.uow, "c.mp4", "video/mp4", 64, &tags, ChronoDuration::minutes(45)).await;
        let upload_id = h
            .storage
            .init_multipart_upload(&file.storage_key, "video/mp4", CHECKSUM)
            .await
            .unwrap();
        let session = seed_session(&h.uow, &file, &upload_id, ChronoDuration::minutes(29)).await;
        let service = cleanup(&h);
        let now = Utc::now();

        let sessions = service.cleanup_expired_sessions(now).await.unwrap();
        let files = service.cleanup_expired_files(now).await.unwrap();

        assert_eq!(sessions, SweepReport::default());
        assert_eq!(files, SweepReport::default());
        let state = h.uow.snapshot().await;
        assert_eq!(state.sessions[&session.id].status, UploadSessionStatus::Open);
        assert_eq!(state.files[&file.id].status, FileStatus::Uploading);
        assert!(state.files[&file.id].deleted_at.is_none());
        assert_eq!(h.storage.abort_calls(), 0);
        assert!(h.storage.has_upload(&upload_id));
    }

    #[tokio::test]
    async fn test_stale_file_with_expired_session_aborts_upload() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["sport"]).await;
        let file = seed_file(&h.uow, "c.mp4", "video/mp4", 64, &tags, ChronoDuration::hours(1)).await;
        let upload_id = h
            .storage
            .init_multipart_upload(&file.storage_key, "video/mp4", CHECKSUM)
            .await
            .unwrap();
        let session = seed_session(&h.uow, &file, &upload_id, -ChronoDuration::minutes(5)).await;

        let report = cleanup(&h).cleanup_expired_files(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport { processed: 1, failed: 0 });
        let state = h.uow.snapshot().await;
        assert_eq!(state.sessions[&session.id].status, UploadSessionStatus::Aborted);
        assert_eq!(state.files[&file.id].status, FileStatus::Failed);
        assert_eq!(h.storage.abort_calls(), 1);
        assert_eq!(h.storage.delete_calls(), 0);
        assert!(!h.storage.has_upload(&upload_id));
    }

    #[tokio::test]
    async fn test_session_sweep_fails_when_file_row_is_missing() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["sport"]).await;
        let file = seed_file(&h.uow, "c.mp4", "video/mp4", 64, &tags, ChronoDuration::hours(3)).await;
        let session = seed_session(&h.uow, &file, "upload-1", -ChronoDuration::hours(2)).await;
        let file_id = file.id;
        h.uow
            .seed(move |state| {
                state.files.remove(&file_id);
            })
            .await;

        let err = cleanup(&h).cleanup_expired_sessions(Utc::now()).await.unwrap_err();

        assert!(matches!(err, AppError::FileMetadataNotFound));
        let state = h.uow.snapshot().await;
        assert_eq!(state.sessions[&session.id].status, UploadSessionStatus::Open);
        assert_eq!(h.storage.abort_calls(), 0);
    }

    #[tokio::test]
    async fn test_file_sweep_propagates_session_lookup_error() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["nature"]).await;
        let file = seed_file(&h.uow, "a.jpg", "image/jpeg", 4, &tags, ChronoDuration::hours(1)).await;
        h.storage.put_object(&file.storage_key, &b"data"[..], None);
        h.uow.fail_on("sessions.find_active_by_file_id");

        let err = cleanup(&h).cleanup_expired_files(Utc::now()).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        let state = h.uow.snapshot().await;
        assert_eq!(state.files[&file.id].status, FileStatus::Uploading);
        assert!(h.storage.has_object(&file.storage_key));
        assert_eq!(h.storage.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_recent_file_is_not_stale() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["nature"]).await;
        seed_file(&h.uow, "a.jpg", "image/jpeg", 4, &tags, ChronoDuration::minutes(5)).await;

        let report = cleanup(&h).cleanup_expired_files(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_cancelled_sweep_stops_between_items() {
        let h = Harness::new();
        let tags = h.uow.seed_tags(&["nature"]).await;
        seed_file(&h.uow, "a.jpg", "image/jpeg", 4, &tags, ChronoDuration::hours(1)).await;
        let token = CancellationToken::new();
        let service = CleanupService::new(
            h.uow.clone(),
            h.storage.clone(),
            Duration::from_secs(60),
            token.clone(),
        );
        token.cancel();

        let report = service.cleanup_expired_files(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert_eq!(h.storage.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_scheduler_exits_on_cancellation() {
        let h = Harness::new();
        let token = CancellationToken::new();
        let service = Arc::new(CleanupService::new(
            h.uow.clone(),
            h.storage.clone(),
            Duration::from_secs(60),
            token.clone(),
        ));

        let handle = service.start(Duration::from_millis(10));
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
