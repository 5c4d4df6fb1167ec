use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use super::dto::{AuthResponse, LoginRequest};
use crate::common::response::{ApiError, ApiSuccess, ErrorBody};
use crate::state::AppState;

/// Exchange a username and password for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Bad Request", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError::bad_request(e.to_string()).into_response();
    }

    match state.credentials.login(payload) {
        Ok(response) => ApiSuccess(response, StatusCode::OK).into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::UNAUTHORIZED).into_response(),
    }
}
