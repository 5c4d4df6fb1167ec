use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use super::dto::{FileResponse, FilesResponse, JobResponse, JobsResponse, TranscodeRequest};
use crate::common::response::{ApiError, ApiSuccess, ErrorBody};
use crate::modules::auth::dto::TokenClaims;
use crate::state::AppState;

/// Upload a source video as multipart field `file`
#[utoipa::path(
    post,
    path = "/api/videos/upload",
    request_body(content = String, content_type = "multipart/form-data", description = "Multipart form with a `file` field"),
    responses(
        (status = 200, description = "File stored", body = FileResponse),
        (status = 400, description = "Missing file", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(e.body_text(), e.status()))?
    {
        if field.name() == Some("file") {
            let file = state.files.store_upload(&claims.sub, field).await?;
            return Ok(ApiSuccess(FileResponse { file }, StatusCode::OK));
        }
    }

    Err(ApiError::bad_request("missing file"))
}

/// Generate a synthetic test clip and store it as a file
#[utoipa::path(
    post,
    path = "/api/videos/generate-sample",
    responses(
        (status = 200, description = "Sample stored", body = FileResponse),
        (status = 500, description = "Tool failure", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn generate_sample(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state.files.generate_sample(&claims.sub).await?;
    Ok(ApiSuccess(FileResponse { file }, StatusCode::OK))
}

/// Start an asynchronous transcode of one of your files
#[utoipa::path(
    post,
    path = "/api/videos/transcode",
    request_body = TranscodeRequest,
    responses(
        (status = 202, description = "Job accepted", body = JobResponse),
        (status = 400, description = "Bad Request", body = ErrorBody),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 503, description = "Queue full", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn transcode(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<TranscodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let job = state
        .jobs
        .submit_job(&claims.sub, &payload.file_id, payload.preset.as_deref())
        .await?;

    Ok(ApiSuccess(JobResponse { job }, StatusCode::ACCEPTED))
}

/// List your files, newest first
#[utoipa::path(
    get,
    path = "/api/videos/files",
    responses((status = 200, description = "Files", body = FilesResponse)),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let files = state.jobs.list_files(&claims.sub).await?;
    Ok(ApiSuccess(FilesResponse { files }, StatusCode::OK))
}

/// List your jobs, newest first
#[utoipa::path(
    get,
    path = "/api/videos/jobs",
    responses((status = 200, description = "Jobs", body = JobsResponse)),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.jobs.list_jobs(&claims.sub).await?;
    Ok(ApiSuccess(JobsResponse { jobs }, StatusCode::OK))
}

/// Get one of your jobs
#[utoipa::path(
    get,
    path = "/api/videos/job/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job", body = JobResponse),
        (status = 404, description = "Job not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.jobs.get_job(&claims.sub, &id).await?;
    Ok(ApiSuccess(JobResponse { job }, StatusCode::OK))
}

/// Download the output of a finished job
#[utoipa::path(
    get,
    path = "/api/videos/download/{jobId}",
    params(("jobId" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Transcoded video stream"),
        (status = 404, description = "Job not found", body = ErrorBody),
        (status = 409, description = "Job not finished", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Videos"
)]
pub async fn download(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.jobs.download_output(&claims.sub, &job_id).await?;

    let mut response = Body::from_stream(download.body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&download.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    if let Some(len) = download.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", download.file_name))
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}
