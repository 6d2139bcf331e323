//! In-process object storage
//!
//! Keeps objects and multipart uploads in memory and counts destructive calls so tests
//! can assert on them. Prefixes registered with [`MemoryStorage::fail_on`] make every
//! mutating call on matching keys fail.

use crate::traits::{FileStorage, ObjectInfo, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use mediagate_core::models::{PartsPage, PresignedRequest, UploadPart};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    checksum_sha256: Option<String>,
    content_type: Option<String>,
    etag: String,
}

#[derive(Debug, Clone)]
struct MultipartUpload {
    key: String,
    content_type: String,
    checksum_sha256: String,
    parts: BTreeMap<i32, StoredObject>,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    uploads: HashMap<String, MultipartUpload>,
    failing_keys: HashSet<String>,
    complete_calls: usize,
    abort_calls: usize,
    delete_calls: usize,
    list_calls: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

fn etag_of(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..16])
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failing(state: &State, key: &str) -> StorageResult<()> {
        if state.failing_keys.iter().any(|prefix| key.starts_with(prefix.as_str())) {
            return Err(StorageError::BackendError(format!(
                "injected failure for {}",
                key
            )));
        }
        Ok(())
    }

    fn presigned(operation: &str, key: &str, expires_in: Duration) -> PresignedRequest {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());
        PresignedRequest {
            url: format!("memory://{}/{}", operation, key),
            headers: HashMap::new(),
            expires_at,
        }
    }

    /// Make every mutating call on keys starting with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        self.state().failing_keys.insert(prefix.to_string());
    }

    /// Store an object as if a client had used a presigned PUT.
    pub fn put_object(&self, key: &str, data: impl Into<Bytes>, checksum_sha256: Option<&str>) {
        let data = data.into();
        let object = StoredObject {
            etag: etag_of(&data),
            data,
            checksum_sha256: checksum_sha256.map(str::to_string),
            content_type: None,
        };
        self.state().objects.insert(key.to_string(), object);
    }

    /// Upload one part of a multipart upload and return its ETag (quoted, like S3).
    pub fn upload_part(
        &self,
        upload_id: &str,
        part_number: i32,
        data: impl Into<Bytes>,
    ) -> StorageResult<String> {
        let data = data.into();
        let etag = etag_of(&data);
        let mut state = self.state();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;
        upload.parts.insert(
            part_number,
            StoredObject {
                data,
                checksum_sha256: None,
                content_type: None,
                etag: etag.clone(),
            },
        );
        Ok(format!("\"{}\"", etag))
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    pub fn has_upload(&self, upload_id: &str) -> bool {
        self.state().uploads.contains_key(upload_id)
    }

    pub fn complete_calls(&self) -> usize {
        self.state().complete_calls
    }

    pub fn abort_calls(&self) -> usize {
        self.state().abort_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn presign_simple_upload(
        &self,
        key: &str,
        checksum_sha256: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest> {
        let mut request = Self::presigned("put", key, expires_in);
        request.headers.insert(
            "x-amz-checksum-sha256".to_string(),
            checksum_sha256.to_string(),
        );
        Ok(request)
    }

    async fn init_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        checksum_sha256: &str,
    ) -> StorageResult<String> {
        let mut state = self.state();
        Self::check_failing(&state, key)?;
        let upload_id = Uuid::new_v4().to_string();
        state.uploads.insert(
            upload_id.clone(),
            MultipartUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                checksum_sha256: checksum_sha256.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        _checksum_sha256: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest> {
        let mut request = Self::presigned("part", key, expires_in);
        request.url = format!(
            "{}?uploadId={}&partNumber={}",
            request.url, upload_id, part_number
        );
        Ok(request)
    }

    async fn list_parts(
        &self,
        _key: &str,
        upload_id: &str,
        max_parts: i32,
        marker: i32,
    ) -> StorageResult<PartsPage> {
        let mut state = self.state();
        state.list_calls += 1;
        let upload = state
            .uploads
            .get(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;

        let limit = max_parts.max(1) as usize;
        let mut remaining = upload.parts.range(marker + 1..);
        let parts: Vec<UploadPart> = remaining
            .by_ref()
            .take(limit)
            .map(|(number, part)| UploadPart {
                part_number: *number,
                etag: part.etag.clone(),
                content_length: part.data.len() as i64,
                ..UploadPart::default()
            })
            .collect();

        let next_marker = match (remaining.next(), parts.last()) {
            (Some(_), Some(last)) => last.part_number,
            _ => 0,
        };

        Ok(PartsPage { parts, next_marker })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<UploadPart>,
    ) -> StorageResult<()> {
        let mut state = self.state();
        state.complete_calls += 1;
        Self::check_failing(&state, key)?;
        parts.sort_by_key(|part| part.part_number);

        let data = {
            let upload = state
                .uploads
                .get(upload_id)
                .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;

            let mut data = BytesMut::new();
            for part in &parts {
                let stored = upload.parts.get(&part.part_number).ok_or_else(|| {
                    StorageError::MultipartFailed(format!("part {} missing", part.part_number))
                })?;
                if stored.etag != part.normalized_etag() {
                    return Err(StorageError::MultipartFailed(format!(
                        "part {} etag mismatch",
                        part.part_number
                    )));
                }
                data.extend_from_slice(&stored.data);
            }
            data.freeze()
        };

        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;
        state.objects.insert(
            upload.key,
            StoredObject {
                etag: format!("{}-{}", etag_of(&data), parts.len()),
                data,
                checksum_sha256: Some(upload.checksum_sha256),
                content_type: Some(upload.content_type),
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let mut state = self.state();
        state.abort_calls += 1;
        Self::check_failing(&state, key)?;
        state
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let mut state = self.state();
        state.delete_calls += 1;
        Self::check_failing(&state, key)?;
        // Deleting a missing object succeeds, as on S3.
        state.objects.remove(key);
        Ok(())
    }

    async fn stat_object(&self, key: &str) -> StorageResult<ObjectInfo> {
        let state = self.state();
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectInfo {
            size: object.data.len() as i64,
            checksum_sha256: object.checksum_sha256.clone(),
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
        })
    }

    async fn read_head(&self, key: &str, len: usize) -> StorageResult<Bytes> {
        let state = self.state();
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(object.data.slice(..object.data.len().min(len)))
    }

    async fn presign_download(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest> {
        Ok(Self::presigned("get", key, expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_parts_paginates_in_order() {
        let storage = MemoryStorage::new();
        let upload_id = storage
            .init_multipart_upload("video/a", "video/mp4", "sum")
            .await
            .unwrap();
        for n in [3, 1, 2] {
            storage.upload_part(&upload_id, n, vec![n as u8; 4]).unwrap();
        }

        let first = storage.list_parts("video/a", &upload_id, 2, 0).await.unwrap();
        assert_eq!(
            first.parts.iter().map(|p| p.part_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(first.next_marker, 2);

        let second = storage
            .list_parts("video/a", &upload_id, 2, first.next_marker)
            .await
            .unwrap();
        assert_eq!(second.parts.len(), 1);
        assert_eq!(second.parts[0].part_number, 3);
        assert_eq!(second.next_marker, 0);
    }

    #[tokio::test]
    async fn test_complete_assembles_object_with_checksum() {
        let storage = MemoryStorage::new();
        let upload_id = storage
            .init_multipart_upload("video/b", "video/mp4", "declared")
            .await
            .unwrap();
        let etag2 = storage.upload_part(&upload_id, 2, &b"world"[..]).unwrap();
        let etag1 = storage.upload_part(&upload_id, 1, &b"hello "[..]).unwrap();

        storage
            .complete_multipart_upload(
                "video/b",
                &upload_id,
                vec![UploadPart::claimed(2, etag2), UploadPart::claimed(1, etag1)],
            )
            .await
            .unwrap();

        let info = storage.stat_object("video/b").await.unwrap();
        assert_eq!(info.size, 11);
        assert_eq!(info.checksum_sha256.as_deref(), Some("declared"));
        assert_eq!(
            storage.read_head("video/b", 5).await.unwrap(),
            Bytes::from_static(b"hello")
        );
        assert!(!storage.has_upload(&upload_id));
    }

    #[tokio::test]
    async fn test_fail_on_key_rejects_mutations() {
        let storage = MemoryStorage::new();
        storage.put_object("image/c", &b"data"[..], None);
        storage.fail_on("image/c");

        assert!(storage.delete_object("image/c").await.is_err());
        assert!(storage.has_object("image/c"));
        assert_eq!(storage.delete_calls(), 1);
    }
}
