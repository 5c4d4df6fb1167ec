use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::common::response::ApiError;
use crate::state::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized: Missing or invalid token"))?;

    let claims = state
        .credentials
        .decode_token(&token)
        .map_err(|_| ApiError::unauthorized("Unauthorized: Invalid token"))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
