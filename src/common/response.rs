use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::modules::video::error::JobError;

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

pub struct ApiSuccess<T>(pub T, pub StatusCode);

impl<T> IntoResponse for ApiSuccess<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let (body, status) = (self.0, self.1);
        (status, Json(body)).into_response()
    }
}

#[derive(Debug)]
pub struct ApiError(pub String, pub StatusCode);

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        ApiError(message.to_string(), StatusCode::UNAUTHORIZED)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(message.into(), StatusCode::BAD_REQUEST)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, status) = (self.0, self.1);
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let status = match &err {
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::Conflict(_) => StatusCode::CONFLICT,
            JobError::Validation(_) => StatusCode::BAD_REQUEST,
            JobError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            JobError::Tool(_) | JobError::Store(_) | JobError::Io(_) => {
                error!("❌ request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(err.to_string(), status)
    }
}
