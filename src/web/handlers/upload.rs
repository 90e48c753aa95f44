//! Upload form and upload endpoint.

use std::sync::Arc;

use askama::Template;
use askama_axum::IntoResponse;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Serialize;

use super::{run_blocking, wants_html, AppState, FileRow};
use crate::datetime::to_rfc3339;
use crate::storage::{StoredFile, UploadRequest};
use crate::web::error::ApiError;

/// Name of the multipart field carrying the file.
const FILE_FIELD: &str = "file";

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub files: Vec<FileRow>,
    pub max_upload_mb: usize,
}

#[derive(Template)]
#[template(path = "upload_done.html")]
pub struct UploadDoneTemplate {
    pub file_url: String,
    pub bucket: String,
    pub name: String,
    pub size: u64,
}

/// Body of a successful upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Absolute URL of the stored file.
    pub file_url: String,
    pub bucket: String,
    pub name: String,
    pub size: u64,
    /// RFC3339 creation time.
    pub created_at: String,
}

impl UploadResponse {
    fn new(file: &StoredFile, public_url: &str) -> Self {
        Self {
            file_url: file.public_url(public_url),
            bucket: file.bucket.to_string(),
            name: file.name.clone(),
            size: file.size,
            created_at: to_rfc3339(&file.created_at),
        }
    }
}

/// GET / - Upload form and list of stored files.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let files = state.file_rows().await?;

    Ok(IndexTemplate {
        files,
        max_upload_mb: state.max_upload_size / 1024 / 1024,
    }
    .into_response())
}

/// POST /upload - Store the file from the multipart field `file`.
///
/// Replies with JSON, or with a confirmation page when the client accepts HTML.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        request.original_name = field.file_name().map(|s| s.to_string());
        request.content_type = field.content_type().map(|s| s.to_string());
        let content = field.bytes().await.map_err(multipart_error)?;

        if content.len() > state.max_upload_size {
            return Err(too_large(state.max_upload_size));
        }
        request.content = Some(content.to_vec());
    }

    let ingestor = state.ingestor.clone();
    let file = run_blocking(move || ingestor.ingest(request)).await?;
    let response = UploadResponse::new(&file, &state.public_url);

    if wants_html(&headers) {
        return Ok(UploadDoneTemplate {
            file_url: response.file_url,
            bucket: response.bucket,
            name: response.name,
            size: response.size,
        }
        .into_response());
    }

    Ok((StatusCode::OK, Json(response)).into_response())
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload exceeded the body limit");
        return ApiError::payload_too_large("File too large");
    }
    tracing::warn!("Failed to read multipart data: {}", e);
    ApiError::bad_request("Invalid multipart data")
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::payload_too_large(format!(
        "File too large (max {}MB)",
        max_bytes / 1024 / 1024
    ))
}
