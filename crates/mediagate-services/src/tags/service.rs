use mediagate_core::models::{Tag, TagsPage};
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use std::sync::Arc;

use super::resolver::normalize_tag_names;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Tag catalogue: creation, lookup by name and cursor-paginated listing.
pub struct TagService<U> {
    uow: Arc<U>,
}

impl<U> Clone for TagService<U> {
    fn clone(&self) -> Self {
        Self {
            uow: self.uow.clone(),
        }
    }
}

impl<U: UnitOfWork> TagService<U> {
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// Creates the given tags. Fails with `AlreadyExists` when every name already exists.
    #[tracing::instrument(skip(self, names), fields(count = names.len()))]
    pub async fn create_tags(&self, names: Vec<String>) -> Result<u64, AppError> {
        let names = normalize_tag_names(&names);
        if names.is_empty() {
            return Err(AppError::InvalidInput("at least one tag name is required".to_string()));
        }

        let created = self
            .uow
            .execute(move |repos| Box::pin(async move { repos.tags().create_many(&names).await }))
            .await?;

        if created == 0 {
            return Err(AppError::AlreadyExists);
        }
        tracing::info!(created, "Tags created");
        Ok(created)
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Tag, AppError> {
        let name = name.trim().to_lowercase();
        self.uow
            .execute(move |repos| Box::pin(async move { repos.tags().find_by_name(&name).await }))
            .await
    }

    /// Tags with a name strictly after `marker`, ascending. `limit` outside `1..=100`
    /// falls back to 20 (non-positive) or 100 (too large).
    pub async fn list_tags(&self, limit: i64, marker: Option<String>) -> Result<TagsPage, AppError> {
        let limit = clamp_page_size(limit);
        let marker = marker
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());

        let mut tags = self
            .uow
            .execute(move |repos| {
                Box::pin(async move { repos.tags().list_after(marker.as_deref(), limit + 1).await })
            })
            .await?;

        let next_marker = if tags.len() as i64 > limit {
            tags.truncate(limit as usize);
            tags.last().map(|tag| tag.name.clone())
        } else {
            None
        };

        Ok(TagsPage { tags, next_marker })
    }
}

fn clamp_page_size(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}
