//! Tag management

use crate::error::{HttpAppError, ValidatedJson, ValidatedQuery};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateTagsRequest {
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTagsResponse {
    pub created: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub marker: Option<String>,
}

/// Tag names are non-empty and alphanumeric.
fn validate_tag_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::InvalidInput("tag cannot be empty".to_string()));
    }
    if !name.chars().all(char::is_alphanumeric) {
        return Err(AppError::InvalidInput(format!(
            "tag {} contains invalid characters",
            name
        )));
    }
    Ok(())
}

#[tracing::instrument(skip(state, request), fields(count = request.tags.len()))]
pub async fn create_tags<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    ValidatedJson(request): ValidatedJson<CreateTagsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.tags.is_empty() {
        return Err(AppError::InvalidInput("tags required".to_string()).into());
    }
    for name in &request.tags {
        validate_tag_name(name)?;
    }

    let created = state.tags.create_tags(request.tags).await?;
    Ok((StatusCode::CREATED, Json(CreateTagsResponse { created })))
}

pub async fn list_tags<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    ValidatedQuery(query): ValidatedQuery<ListTagsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let marker = query.marker.filter(|m| !m.is_empty());
    let page = state
        .tags
        .list_tags(query.limit.unwrap_or(0), marker)
        .await?;
    Ok(Json(page))
}

pub async fn get_tag<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let tag = state.tags.get_tag_by_name(&name).await?;
    Ok(Json(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tag_name() {
        assert!(validate_tag_name("football2024").is_ok());
        assert!(validate_tag_name("").is_err());
        assert!(validate_tag_name("big game").is_err());
        assert!(validate_tag_name("a-b").is_err());
    }
}
