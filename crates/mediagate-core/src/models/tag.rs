use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag names are stored lowercase and unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileTag {
    pub file_id: Uuid,
    pub tag_id: Uuid,
}

/// One page of tags ordered by name; `next_marker` is the last name returned when more remain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsPage {
    pub tags: Vec<Tag>,
    pub next_marker: Option<String>,
}
