//! Multipart session endpoints: part URLs, part listing and completion

use crate::error::{HttpAppError, ValidatedJson, ValidatedQuery};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use mediagate_core::models::UploadPart;
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RequestedPart {
    pub part_number: i32,
    pub checksum: String,
    pub content_length: i64,
}

#[derive(Debug, Deserialize)]
pub struct PresignPartsRequest {
    #[serde(default)]
    pub parts: Vec<RequestedPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignedPart {
    pub part_number: i32,
    pub presigned_url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignPartsResponse {
    pub presigned_parts: Vec<PresignedPart>,
}

#[derive(Debug, Deserialize)]
pub struct ListPartsQuery {
    #[serde(default)]
    pub max_parts: Option<i32>,
    #[serde(default)]
    pub marker: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListedPart {
    pub part_number: i32,
    pub etag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListPartsResponse {
    pub parts: Vec<ListedPart>,
    pub parts_marker: i32,
}

#[derive(Debug, Deserialize)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteMultipartRequest {
    #[serde(default)]
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteMultipartResponse {
    pub file_id: Uuid,
}

fn validate_requested_part(part: &RequestedPart) -> Result<(), AppError> {
    let problem = if part.part_number <= 0 {
        "invalid part number"
    } else if part.content_length <= 0 {
        "invalid content length"
    } else if part.checksum.trim().is_empty() {
        "invalid checksum"
    } else {
        return Ok(());
    };
    Err(AppError::InvalidInput(format!(
        "part {}: {}",
        part.part_number, problem
    )))
}

#[tracing::instrument(skip(state, request), fields(session_id = %session_id))]
pub async fn presign_parts<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<PresignPartsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.parts.is_empty() {
        return Err(AppError::InvalidInput("request contains no parts".to_string()).into());
    }

    let mut parts = Vec::with_capacity(request.parts.len());
    for part in request.parts {
        validate_requested_part(&part)?;
        parts.push(UploadPart {
            part_number: part.part_number,
            checksum_sha256: Some(part.checksum),
            content_length: part.content_length,
            ..UploadPart::default()
        });
    }

    let offers = state.files.get_presigned_parts(session_id, parts).await?;

    let presigned_parts = offers
        .into_iter()
        .map(|part| PresignedPart {
            part_number: part.part_number,
            presigned_url: part.presigned_url.unwrap_or_default(),
            expires_at: part.expires_at,
            headers: part.headers,
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(PresignPartsResponse { presigned_parts }),
    ))
}

pub async fn list_parts<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(session_id): Path<Uuid>,
    ValidatedQuery(query): ValidatedQuery<ListPartsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state
        .files
        .list_parts(
            session_id,
            query.max_parts.unwrap_or(0),
            query.marker.unwrap_or(0),
        )
        .await?;

    Ok(Json(ListPartsResponse {
        parts: page
            .parts
            .into_iter()
            .map(|part| ListedPart {
                part_number: part.part_number,
                etag: part.etag,
            })
            .collect(),
        parts_marker: page.next_marker,
    }))
}

#[tracing::instrument(skip(state, request), fields(session_id = %session_id))]
pub async fn complete_multipart_upload<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CompleteMultipartRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.parts.is_empty() {
        return Err(AppError::InvalidInput("request contains no parts".to_string()).into());
    }

    let parts = request
        .parts
        .into_iter()
        .map(|part| UploadPart {
            checksum_sha256: part.checksum,
            ..UploadPart::claimed(part.part_number, part.etag)
        })
        .collect();

    let file_id = state
        .files
        .complete_multipart_upload(session_id, parts)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CompleteMultipartResponse { file_id }),
    ))
}
