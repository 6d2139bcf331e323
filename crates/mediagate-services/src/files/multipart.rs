use mediagate_core::models::{PartsPage, UploadPart};
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use std::collections::HashMap;
use uuid::Uuid;

use super::FileService;

/// Largest page storage is asked for when listing parts.
pub const MAX_LIST_PARTS: i32 = 1000;

impl<U: UnitOfWork> FileService<U> {
    /// Presigned PUT URLs for the requested parts of an open session.
    #[tracing::instrument(skip(self, parts), fields(session_id = %session_id, parts = parts.len()))]
    pub async fn get_presigned_parts(
        &self,
        session_id: Uuid,
        parts: Vec<UploadPart>,
    ) -> Result<Vec<UploadPart>, AppError> {
        let (session, file) = self.touch_session(session_id).await?;

        let mut offers = Vec::with_capacity(parts.len());
        for part in parts {
            let request = self
                .storage
                .presign_upload_part(
                    &file.storage_key,
                    &session.provider_upload_id,
                    part.part_number,
                    part.checksum_sha256.as_deref(),
                    self.presign.multipart_part,
                )
                .await?;
            offers.push(UploadPart {
                part_number: part.part_number,
                presigned_url: Some(request.url),
                headers: request.headers,
                expires_at: Some(request.expires_at),
                ..UploadPart::default()
            });
        }
        Ok(offers)
    }

    /// One page of the parts storage holds for the session. `max_parts` outside
    /// `1..=1000` is treated as 1000.
    pub async fn list_parts(
        &self,
        session_id: Uuid,
        max_parts: i32,
        marker: i32,
    ) -> Result<PartsPage, AppError> {
        let (session, file) = self.touch_session(session_id).await?;
        let max_parts = if max_parts <= 0 || max_parts > MAX_LIST_PARTS {
            MAX_LIST_PARTS
        } else {
            max_parts
        };

        let page = self
            .storage
            .list_parts(
                &file.storage_key,
                &session.provider_upload_id,
                max_parts,
                marker.max(0),
            )
            .await?;
        Ok(page)
    }

    /// Verifies a completion claim against storage's part listing and, if it matches,
    /// asks storage to assemble the object. Returns the file id.
    ///
    /// The file stays `uploading`: it only becomes `completed` once the storage
    /// notification has been reconciled.
    #[tracing::instrument(skip(self, parts), fields(session_id = %session_id, parts = parts.len()))]
    pub async fn complete_multipart_upload(
        &self,
        session_id: Uuid,
        parts: Vec<UploadPart>,
    ) -> Result<Uuid, AppError> {
        let (session, file) = self.touch_session(session_id).await?;

        let mut expected: HashMap<i32, &str> = HashMap::with_capacity(parts.len());
        for part in &parts {
            if expected
                .insert(part.part_number, part.normalized_etag())
                .is_some()
            {
                return Err(AppError::DuplicatePart(part.part_number));
            }
        }

        let mut marker = 0;
        let mut listed = 0usize;
        loop {
            let page = self
                .storage
                .list_parts(
                    &file.storage_key,
                    &session.provider_upload_id,
                    MAX_LIST_PARTS,
                    marker,
                )
                .await?;

            for part in &page.parts {
                listed += 1;
                match expected.get(&part.part_number) {
                    Some(claimed) if *claimed == part.normalized_etag() => {}
                    _ => {
                        tracing::warn!(
                            part_number = part.part_number,
                            "Claimed part does not match storage"
                        );
                        return Err(AppError::MismatchETag);
                    }
                }
            }

            if page.next_marker == 0 {
                break;
            }
            marker = page.next_marker;
        }

        if listed != parts.len() {
            tracing::warn!(listed, claimed = parts.len(), "Part count mismatch");
            return Err(AppError::MismatchNbParts);
        }

        self.storage
            .complete_multipart_upload(&file.storage_key, &session.provider_upload_id, parts)
            .await?;

        tracing::info!(file_id = %file.id, "Multipart upload assembled");
        Ok(file.id)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{new_file, Harness};
    use chrono::Utc;
    use mediagate_core::models::{FileStatus, UploadPart};
    use mediagate_core::AppError;
    use uuid::Uuid;

    async fn open_session(h: &Harness) -> (Uuid, String) {
        h.uow.seed_tags(&["sport"]).await;
        let ticket = h
            .files
            .request_upload_multipart_file(new_file("clip.mp4", "video/mp4", 50_000_000, &["sport"]))
            .await
            .unwrap();
        let upload_id = h.uow.snapshot().await.sessions[&ticket.session_id]
            .provider_upload_id
            .clone();
        (ticket.session_id, upload_id)
    }

    #[tokio::test]
    async fn test_get_presigned_parts_slides_ttl() {
        let h = Harness::new();
        let (session_id, _) = open_session(&h).await;
        let before = h.uow.snapshot().await.sessions[&session_id].expires_at;

        let offers = h
            .files
            .get_presigned_parts(
                session_id,
                vec![UploadPart::claimed(1, ""), UploadPart::claimed(2, "")],
            )
            .await
            .unwrap();

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[1].part_number, 2);
        assert!(offers.iter().all(|o| o.presigned_url.is_some()));
        assert!(offers.iter().all(|o| o.expires_at.unwrap() > Utc::now()));
        assert!(h.uow.snapshot().await.sessions[&session_id].expires_at >= before);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let h = Harness::new();

        let err = h
            .files
            .list_parts(Uuid::new_v4(), 10, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_list_parts_clamps_page_size() {
        let h = Harness::new();
        let (session_id, upload_id) = open_session(&h).await;
        for n in 1..=3 {
            h.storage.upload_part(&upload_id, n, vec![n as u8; 8]).unwrap();
        }

        let page = h.files.list_parts(session_id, 0, 0).await.unwrap();
        assert_eq!(page.parts.len(), 3);
        assert_eq!(page.next_marker, 0);

        let page = h.files.list_parts(session_id, 2, 0).await.unwrap();
        assert_eq!(page.parts.len(), 2);
        assert_eq!(page.next_marker, 2);
    }

    #[tokio::test]
    async fn test_complete_multipart_assembles_without_completing_file() {
        let h = Harness::new();
        let (session_id, upload_id) = open_session(&h).await;
        let etag1 = h.storage.upload_part(&upload_id, 1, vec![1u8; 8]).unwrap();
        let etag2 = h.storage.upload_part(&upload_id, 2, vec![2u8; 8]).unwrap();

        let file_id = h
            .files
            .complete_multipart_upload(
                session_id,
                vec![UploadPart::claimed(2, etag2), UploadPart::claimed(1, etag1)],
            )
            .await
            .unwrap();

        assert_eq!(h.storage.complete_calls(), 1);
        let state = h.uow.snapshot().await;
        assert_eq!(state.files[&file_id].status, FileStatus::Uploading);
        assert!(h.storage.has_object(&state.files[&file_id].storage_key));
    }

    #[tokio::test]
    async fn test_complete_rejects_missing_part() {
        let h = Harness::new();
        let (session_id, upload_id) = open_session(&h).await;
        let etag1 = h.storage.upload_part(&upload_id, 1, vec![1u8; 8]).unwrap();

        let err = h
            .files
            .complete_multipart_upload(
                session_id,
                vec![
                    UploadPart::claimed(1, etag1),
                    UploadPart::claimed(2, "etag2"),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MismatchNbParts));
        assert_eq!(h.storage.complete_calls(), 0);
    }

    #[tokio::test]
    async fn test_complete_rejects_duplicate_part_before_storage() {
        let h = Harness::new();
        let (session_id, _) = open_session(&h).await;

        let err = h
            .files
            .complete_multipart_upload(
                session_id,
                vec![UploadPart::claimed(1, "a"), UploadPart::claimed(1, "b")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DuplicatePart(1)));
        assert_eq!(h.storage.list_calls(), 0);
        assert_eq!(h.storage.complete_calls(), 0);
    }

    #[tokio::test]
    async fn test_complete_rejects_wrong_etag() {
        let h = Harness::new();
        let (session_id, upload_id) = open_session(&h).await;
        h.storage.upload_part(&upload_id, 1, vec![1u8; 8]).unwrap();

        let err = h
            .files
            .complete_multipart_upload(session_id, vec![UploadPart::claimed(1, "\"forged\"")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MismatchETag));
        assert_eq!(h.storage.complete_calls(), 0);
    }

    #[tokio::test]
    async fn test_complete_pages_through_listing() {
        let h = Harness::new();
        let (session_id, upload_id) = open_session(&h).await;
        let mut claim = Vec::new();
        for n in 1..=1001 {
            let etag = h.storage.upload_part(&upload_id, n, vec![1u8]).unwrap();
            claim.push(UploadPart::claimed(n, etag));
        }

        h.files
            .complete_multipart_upload(session_id, claim)
            .await
            .unwrap();

        assert_eq!(h.storage.list_calls(), 2);
        assert_eq!(h.storage.complete_calls(), 1);
    }
}
