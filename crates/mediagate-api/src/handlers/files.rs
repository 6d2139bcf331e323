//! File upload requests and downloads

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use mediagate_core::models::NewFile;
use mediagate_core::AppError;
use mediagate_db::UnitOfWork;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Body of both upload requests.
#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UploadFileRequest {
    fn into_new_file(self) -> Result<NewFile, AppError> {
        if self.filename.trim().is_empty()
            || self.content_type.trim().is_empty()
            || self.size_bytes <= 0
            || self.checksum_sha256.trim().is_empty()
        {
            return Err(AppError::InvalidInput(
                "filename, content_type, size_bytes and checksum_sha256 are required".to_string(),
            ));
        }
        if self.tags.is_empty() {
            return Err(AppError::InvalidInput(
                "provide at least one tag".to_string(),
            ));
        }
        Ok(NewFile {
            filename: self.filename,
            mime_type: self.content_type,
            size_bytes: self.size_bytes,
            checksum: self.checksum_sha256,
            tags: self.tags,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadFileResponse {
    pub file_id: Uuid,
    pub presigned_url: String,
    pub headers: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadMultipartResponse {
    pub session_id: Uuid,
    pub part_size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetFileResponse {
    pub filename: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

#[tracing::instrument(skip(state, request), fields(filename = %request.filename))]
pub async fn request_upload_file<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    ValidatedJson(request): ValidatedJson<UploadFileRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ticket = state
        .files
        .request_upload_file(request.into_new_file()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadFileResponse {
            file_id: ticket.file_id,
            presigned_url: ticket.url,
            headers: ticket.headers,
            expires_at: ticket.expires_at,
        }),
    ))
}

#[tracing::instrument(skip(state, request), fields(filename = %request.filename))]
pub async fn request_upload_multipart_file<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    ValidatedJson(request): ValidatedJson<UploadFileRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ticket = state
        .files
        .request_upload_multipart_file(request.into_new_file()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadMultipartResponse {
            session_id: ticket.session_id,
            part_size: ticket.part_size,
        }),
    ))
}

pub async fn get_file<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let download = state.files.get_file(file_id).await?;

    Ok(Json(GetFileResponse {
        filename: download.filename,
        url: download.url,
        expires_at: download.expires_at,
        tags: download.tags.into_iter().map(|tag| tag.name).collect(),
    }))
}
