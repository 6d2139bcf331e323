//! Object storage bucket notifications (S3 / MinIO event format)

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

const EVENT_PUT: &str = "s3:ObjectCreated:Put";
const EVENT_COMPLETE_MULTIPART: &str = "s3:ObjectCreated:CompleteMultipartUpload";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    SimpleUploadComplete,
    MultipartUploadComplete,
    Unknown,
}

impl EventType {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            EVENT_PUT => EventType::SimpleUploadComplete,
            EVENT_COMPLETE_MULTIPART => EventType::MultipartUploadComplete,
            _ => EventType::Unknown,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, EventType::MultipartUploadComplete)
    }
}

#[derive(Debug, Deserialize)]
struct BucketEvent {
    #[serde(rename = "Records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "eventName", default)]
    event_name: String,
    #[serde(rename = "eventTime", default)]
    event_time: Option<DateTime<Utc>>,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
    #[serde(default)]
    size: i64,
    #[serde(rename = "eTag", default)]
    etag: String,
}

/// The first record of a bucket notification, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadNotification {
    pub event_name: String,
    pub event_type: EventType,
    pub event_time: Option<DateTime<Utc>>,
    pub storage_name: String,
    pub object_key: String,
    pub object_size: i64,
    pub object_etag: String,
    /// Last segment of the object key.
    pub file_id: Uuid,
}

impl UploadNotification {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        let event: BucketEvent = serde_json::from_slice(payload)?;
        let record = event
            .records
            .into_iter()
            .next()
            .ok_or_else(|| AppError::InvalidNotification("no records in event".to_string()))?;

        // Keys arrive query-escaped ("+" for spaces).
        let object_key = percent_decode_str(&record.s3.object.key.replace('+', " "))
            .decode_utf8()
            .map_err(|e| AppError::InvalidNotification(format!("invalid object key: {}", e)))?
            .into_owned();

        let file_segment = object_key.rsplit('/').next().unwrap_or_default();
        let file_id = Uuid::parse_str(file_segment).map_err(|e| {
            AppError::InvalidNotification(format!("object key {} has no file id: {}", object_key, e))
        })?;

        Ok(Self {
            event_type: EventType::from_event_name(&record.event_name),
            event_name: record.event_name,
            event_time: record.event_time,
            storage_name: record.s3.bucket.name,
            object_key,
            object_size: record.s3.object.size,
            object_etag: record.s3.object.etag,
            file_id,
        })
    }
}
