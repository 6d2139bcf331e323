use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A multipart part. Depending on direction it is an upload offer (URL, headers, expiry),
/// a client claim (number, ETag) or an entry of storage's part listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadPart {
    pub part_number: i32,
    #[serde(default)]
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_sha256: Option<String>,
    #[serde(default)]
    pub content_length: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl UploadPart {
    pub fn claimed(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
            ..Self::default()
        }
    }

    /// ETag without the surrounding quotes storage providers add.
    pub fn normalized_etag(&self) -> &str {
        self.etag.trim_matches('"')
    }
}

/// One page of storage's authoritative part listing. `next_marker == 0` means no more pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartsPage {
    pub parts: Vec<UploadPart>,
    pub next_marker: i32,
}

/// A signed request a client replays against object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresignedRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}
