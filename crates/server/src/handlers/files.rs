//! Document endpoints: upload, lookup, rename, version history and download.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::versioning::VersionSelector;
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use folio_core::DocumentId;
use folio_metadata::{DocumentRow, VersionRow};
use futures::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use time::OffsetDateTime;

/// Header carrying the acting user's ID on uploads.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header naming the version a download served.
pub const VERSION_HEADER: &str = "x-folio-version";

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// RFC 5987 attr-char minus the characters some clients mishandle.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Current state of a document.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    pub name: String,
    pub version: i64,
    pub size: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
    pub creator_id: String,
    pub modifier_id: String,
}

impl From<DocumentRow> for DocumentResponse {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            version: row.version,
            size: row.size_bytes,
            created_at: row.created_at,
            modified_at: row.modified_at,
            creator_id: row.creator_id,
            modifier_id: row.modifier_id,
        }
    }
}

/// One entry of a document's version history.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: i64,
    pub name: String,
    pub size: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub modifier_id: String,
    /// Only reported when a single version is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_present: Option<bool>,
}

impl From<VersionRow> for VersionResponse {
    fn from(row: VersionRow) -> Self {
        Self {
            version: row.version,
            name: row.name,
            size: row.size_bytes,
            created_at: row.created_at,
            modifier_id: row.modifier_id,
            content_present: None,
        }
    }
}

/// Page of version history.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionListResponse {
    pub file_id: String,
    pub offset: u32,
    pub limit: u32,
    pub versions: Vec<VersionResponse>,
}

/// Upload result.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub version: i64,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListVersionsQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// POST /v1/files/{file_id}/upload?name=... - Store a new version.
///
/// The request body is the raw file content. The acting user is taken from
/// the `X-User-Id` header.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let document_id = DocumentId::new(&file_id)?;
    let name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'name' query parameter".to_string()))?;
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {USER_ID_HEADER} header")))?;

    let size = body.len() as u64;
    let version = state
        .coordinator
        .upload(&document_id, &name, Cursor::new(body), size, user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id: document_id.into_inner(),
            version,
            name: folio_core::sanitize_file_name(&name)?,
            size,
        }),
    ))
}

/// GET /v1/files/{file_id} - Current document state.
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<DocumentResponse>> {
    let document_id = DocumentId::new(&file_id)?;
    let document = state.coordinator.get_document(&document_id).await?;
    Ok(Json(document.into()))
}

/// PUT /v1/files/{file_id}/name - Change the display name.
pub async fn rename_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Json<DocumentResponse>> {
    let document_id = DocumentId::new(&file_id)?;
    let document = state
        .coordinator
        .rename_document(&document_id, &request.name)
        .await?;
    Ok(Json(document.into()))
}

/// GET /v1/files/{file_id}/versions - Version history, newest first.
pub async fn list_versions(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<ListVersionsQuery>,
) -> ApiResult<Json<VersionListResponse>> {
    let document_id = DocumentId::new(&file_id)?;
    let offset = query.offset.unwrap_or(0);
    let limit = match query.limit {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(limit) => limit.min(MAX_PAGE_SIZE),
    };

    let versions = state
        .coordinator
        .list_versions(&document_id, offset, limit)
        .await?;

    Ok(Json(VersionListResponse {
        file_id: document_id.into_inner(),
        offset,
        limit,
        versions: versions.into_iter().map(VersionResponse::from).collect(),
    }))
}

/// GET /v1/files/{file_id}/versions/{version} - One version record.
pub async fn get_version(
    State(state): State<AppState>,
    Path((file_id, version)): Path<(String, String)>,
) -> ApiResult<Json<VersionResponse>> {
    let document_id = DocumentId::new(&file_id)?;
    let version = parse_version(&version)?;

    let status = state
        .coordinator
        .version_status(&document_id, version)
        .await?;

    let mut response = VersionResponse::from(status.record);
    response.content_present = Some(status.content_present);
    Ok(Json(response))
}

/// GET /v1/files/{file_id}/download?version=latest|N - Stream content.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let document_id = DocumentId::new(&file_id)?;
    let selector: VersionSelector = query.version.as_deref().unwrap_or("latest").parse()?;

    let target = state
        .coordinator
        .resolve_download(&document_id, selector)
        .await?;
    let size = state
        .coordinator
        .content_size(&document_id, target.version)
        .await?;
    let stream = state
        .coordinator
        .fetch_content(&document_id, target.version)
        .await?;

    let document_id_for_log = document_id.clone();
    let version = target.version;
    let body_stream = stream.map(move |result| {
        result.map_err(|e| {
            tracing::error!(
                document_id = %document_id_for_log,
                version,
                error = %e,
                "Content streaming failed mid-transfer"
            );
            std::io::Error::other(e.to_string())
        })
    });

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_LENGTH, size.to_string()),
            (CONTENT_DISPOSITION, content_disposition(&target.file_name)),
            (
                axum::http::HeaderName::from_static(VERSION_HEADER),
                target.version.to_string(),
            ),
        ],
        Body::from_stream(body_stream),
    )
        .into_response())
}

fn parse_version(raw: &str) -> ApiResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(version) if version >= 1 => Ok(version),
        _ => Err(ApiError::BadRequest(format!("invalid version: {raw}"))),
    }
}

/// `attachment` disposition with an RFC 5987 encoded UTF-8 file name.
pub fn content_disposition(file_name: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(file_name, FILENAME_ENCODE_SET)
    )
}
