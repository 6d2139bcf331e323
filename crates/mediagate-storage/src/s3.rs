use crate::traits::{FileStorage, ObjectInfo, StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::{PresignedRequest as SdkPresignedRequest, PresigningConfig};
use aws_sdk_s3::types::{ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::Utc;
use mediagate_core::models::{PartsPage, PresignedRequest, UploadPart};
use mediagate_core::StorageConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// User metadata entry holding the declared SHA-256 of an object.
const CHECKSUM_METADATA_KEY: &str = "checksum-sha256";
const CHECKSUM_HEADER: &str = "x-amz-checksum-sha256";
const CHECKSUM_ALGORITHM_HEADER: &str = "x-amz-sdk-checksum-algorithm";
const CHECKSUM_METADATA_HEADER: &str = "x-amz-meta-checksum-sha256";

/// S3-compatible object storage (AWS S3, MinIO, ...)
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// When `endpoint_url` is set (e.g. "http://localhost:9000" for MinIO) the client
    /// uses path-style addressing.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::ConfigError("bucket name is empty".to_string()));
        }

        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(config.region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = config.endpoint_url {
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(sdk_config.region().cloned())
                .retry_config(retry_config)
                .force_path_style(true);
            if let Some(provider) = sdk_config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&sdk_config)
        };

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "S3 storage initialized"
        );

        Ok(S3Storage {
            client,
            bucket: config.bucket.clone(),
        })
    }

    fn presigning_config(expires_in: Duration) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))
    }

    /// Signed request plus the headers the client must replay verbatim.
    fn to_presigned(
        request: SdkPresignedRequest,
        required_headers: &[(&str, &str)],
        expires_in: Duration,
    ) -> PresignedRequest {
        let mut headers: HashMap<String, String> = request
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        for (name, value) in required_headers {
            headers.insert(name.to_string(), value.to_string());
        }
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());

        PresignedRequest {
            url: request.uri().to_string(),
            headers,
            expires_at,
        }
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn presign_simple_upload(
        &self,
        key: &str,
        checksum_sha256: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .checksum_algorithm(ChecksumAlgorithm::Sha256)
            .checksum_sha256(checksum_sha256)
            .metadata(CHECKSUM_METADATA_KEY, checksum_sha256)
            .presigned(Self::presigning_config(expires_in)?)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 presign put failed");
                StorageError::PresignFailed(e.to_string())
            })?;

        Ok(Self::to_presigned(
            request,
            &[
                (CHECKSUM_HEADER, checksum_sha256),
                (CHECKSUM_ALGORITHM_HEADER, "SHA256"),
                (CHECKSUM_METADATA_HEADER, checksum_sha256),
            ],
            expires_in,
        ))
    }

    async fn init_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        checksum_sha256: &str,
    ) -> StorageResult<String> {
        let start = Instant::now();

        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .metadata(CHECKSUM_METADATA_KEY, checksum_sha256)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                StorageError::MultipartFailed(e.to_string())
            })?;

        let upload_id = output.upload_id().ok_or_else(|| {
            StorageError::MultipartFailed("No upload ID returned from S3".to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload created"
        );

        Ok(upload_id.to_string())
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        checksum_sha256: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest> {
        let mut builder = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number);
        if let Some(checksum) = checksum_sha256 {
            builder = builder
                .checksum_algorithm(ChecksumAlgorithm::Sha256)
                .checksum_sha256(checksum);
        }

        let request = builder
            .presigned(Self::presigning_config(expires_in)?)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    part_number,
                    "S3 presign upload part failed"
                );
                StorageError::PresignFailed(e.to_string())
            })?;

        let required: Vec<(&str, &str)> = match checksum_sha256 {
            Some(checksum) => vec![
                (CHECKSUM_HEADER, checksum),
                (CHECKSUM_ALGORITHM_HEADER, "SHA256"),
            ],
            None => Vec::new(),
        };
        Ok(Self::to_presigned(request, &required, expires_in))
    }

    async fn list_parts(
        &self,
        key: &str,
        upload_id: &str,
        max_parts: i32,
        marker: i32,
    ) -> StorageResult<PartsPage> {
        let start = Instant::now();

        let output = self
            .client
            .list_parts()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .max_parts(max_parts)
            .part_number_marker(marker.to_string())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    upload_id = %upload_id,
                    "S3 list parts failed"
                );
                StorageError::MultipartFailed(e.to_string())
            })?;

        let parts: Vec<UploadPart> = output
            .parts()
            .iter()
            .map(|part| UploadPart {
                part_number: part.part_number().unwrap_or_default(),
                etag: part.e_tag().unwrap_or_default().trim_matches('"').to_string(),
                checksum_sha256: part.checksum_sha256().map(str::to_string),
                content_length: part.size().unwrap_or_default(),
                ..UploadPart::default()
            })
            .collect();

        let next_marker = if output.is_truncated().unwrap_or(false) {
            output
                .next_part_number_marker()
                .and_then(|m| m.parse().ok())
                .unwrap_or_default()
        } else {
            0
        };

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            parts = parts.len(),
            next_marker,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list parts successful"
        );

        Ok(PartsPage { parts, next_marker })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<UploadPart>,
    ) -> StorageResult<()> {
        let start = Instant::now();
        parts.sort_by_key(|part| part.part_number);

        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.normalized_etag())
                    .set_checksum_sha256(part.checksum_sha256.clone())
                    .build()
            })
            .collect();
        let part_count = completed_parts.len();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to complete multipart upload"
                );
                StorageError::MultipartFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            parts = part_count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload completed"
        );

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let start = Instant::now();

        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(
                        service_err.err(),
                        AbortMultipartUploadError::NoSuchUpload(_)
                    ) =>
                {
                    StorageError::NotFound(format!("{} (upload {})", key, upload_id))
                }
                _ => {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %key,
                        upload_id = %upload_id,
                        "S3 abort multipart upload failed"
                    );
                    StorageError::MultipartFailed(e.to_string())
                }
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload aborted"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let start = Instant::now();

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn stat_object(&self, key: &str) -> StorageResult<ObjectInfo> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
                {
                    StorageError::NotFound(key.to_string())
                }
                _ => StorageError::BackendError(e.to_string()),
            })?;

        let checksum_sha256 = output
            .metadata()
            .and_then(|metadata| metadata.get(CHECKSUM_METADATA_KEY))
            .cloned();

        Ok(ObjectInfo {
            size: output.content_length().unwrap_or_default(),
            checksum_sha256,
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(|etag| etag.trim_matches('"').to_string()),
        })
    }

    async fn read_head(&self, key: &str, len: usize) -> StorageResult<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes=0-{}", len - 1))
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    StorageError::NotFound(key.to_string())
                }
                _ => {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 ranged download failed"
                    );
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes();

        Ok(data.slice(..data.len().min(len)))
    }

    async fn presign_download(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresignedRequest> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning_config(expires_in)?)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(Self::to_presigned(request, &[], expires_in))
    }
}
