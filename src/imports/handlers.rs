use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, instrument, warn};

use crate::{
    accounts::repo_types::RoleId,
    auth::extractors::SuperAdmin,
    state::AppState,
};

use super::dto::{ImportSummary, RolesResponse};
use super::error::ImportError;
use super::report::{self, RESULTS_FILE_NAME, TEMPLATE_FILE_NAME};
use super::results::ResultId;
use super::services::run_import;
use super::upload::{validate_upload, UploadedFile, MAX_FILE_SIZE, XLSX_CONTENT_TYPE};

// Room for the boundaries, headers and the roleId field around the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/template", get(download_template))
        .route("/results/:result_id", get(download_results))
        .route("/roles", get(list_roles))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(import_users))
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + MULTIPART_OVERHEAD))
}

#[instrument(skip(_admin))]
pub async fn download_template(_admin: SuperAdmin) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bytes = report::template_workbook().map_err(|e| {
        error!(error = %e, "template generation failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate template".to_string(),
        )
    })?;
    Ok(xlsx_attachment(TEMPLATE_FILE_NAME, Bytes::from(bytes)))
}

/// POST /import (multipart: `file`, `roleId`)
#[instrument(skip(state, multipart))]
pub async fn import_users(
    State(state): State<AppState>,
    SuperAdmin(admin_id): SuperAdmin,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>, (StatusCode, String)> {
    let mut file: Option<UploadedFile> = None;
    let mut role_field: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_rejection)?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("roleId") => {
                role_field = Some(field.text().await.map_err(multipart_rejection)?);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| reject(ImportError::MissingFile))?;
    validate_upload(&file).map_err(reject)?;

    let role_id = role_field
        .as_deref()
        .and_then(|v| v.trim().parse::<RoleId>().ok())
        .filter(|id| *id > 0)
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Valid role ID is required".to_string(),
        ))?;

    let role = state.roles.find_role(role_id).await.map_err(|e| {
        error!(error = %e, role_id, "role lookup failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    if role.is_none() {
        warn!(role_id, "import requested for unknown role");
        return Err((StatusCode::BAD_REQUEST, "Invalid role ID".to_string()));
    }

    let summary = run_import(&state, &file.bytes, role_id, admin_id)
        .await
        .map_err(reject)?;
    Ok(Json(summary))
}

/// GET /results/:result_id, consumes the stored report.
#[instrument(skip(state))]
pub async fn download_results(
    State(state): State<AppState>,
    SuperAdmin(admin_id): SuperAdmin,
    Path(result_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let id = ResultId::parse(&result_id).ok_or((
        StatusCode::BAD_REQUEST,
        "Invalid result ID format".to_string(),
    ))?;

    let bytes = state.results.redeem(&id, admin_id).map_err(|e| {
        warn!(error = %e, %id, admin_id, "results download refused");
        (e.status(), e.to_string())
    })?;
    Ok(xlsx_attachment(RESULTS_FILE_NAME, bytes))
}

#[instrument(skip(state, _admin))]
pub async fn list_roles(
    State(state): State<AppState>,
    _admin: SuperAdmin,
) -> Result<Json<RolesResponse>, (StatusCode, String)> {
    let roles = state.roles.list_roles().await.map_err(|e| {
        error!(error = %e, "list_roles failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(RolesResponse { roles }))
}

fn xlsx_attachment(file_name: &str, bytes: Bytes) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
}

fn reject(e: ImportError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "import failed");
    } else {
        warn!(error = %e, "import rejected");
    }
    (status, e.to_string())
}

fn multipart_rejection(e: MultipartError) -> (StatusCode, String) {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return (e.status(), ImportError::FileTooLarge.to_string());
    }
    (e.status(), e.body_text())
}
