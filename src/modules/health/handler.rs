use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::response::{ApiError, ApiSuccess, ErrorBody};
use crate::state::AppState;
use crate::workers::transcoder::QueueStats;

#[derive(Debug, Serialize, ToSchema)]
pub struct IndexResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub queue: QueueStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CpuResponse {
    pub ok: bool,
    pub result: u64,
}

#[utoipa::path(
    get,
    path = "/api",
    responses((status = 200, description = "API is reachable", body = IndexResponse)),
    tag = "Health"
)]
pub async fn index() -> ApiSuccess<IndexResponse> {
    ApiSuccess(
        IndexResponse {
            ok: true,
            message: "transcode API up".to_string(),
        },
        StatusCode::OK,
    )
}

/// Liveness plus transcode queue occupancy
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> ApiSuccess<HealthResponse> {
    ApiSuccess(
        HealthResponse {
            ok: true,
            queue: state.jobs.queue_stats(),
        },
        StatusCode::OK,
    )
}

/// Burns CPU on a Mandelbrot render, for load testing
#[utoipa::path(
    get,
    path = "/api/health/cpu",
    responses(
        (status = 200, description = "Points inside the set", body = CpuResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Health"
)]
pub async fn cpu() -> Result<ApiSuccess<CpuResponse>, ApiError> {
    let result = tokio::task::spawn_blocking(|| mandelbrot(1100, 800, 1200))
        .await
        .map_err(|e| ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR))?;

    Ok(ApiSuccess(CpuResponse { ok: true, result }, StatusCode::OK))
}

/// Counts the points of a `width`x`height` grid that stay bounded for `max_iter` steps.
pub fn mandelbrot(width: u32, height: u32, max_iter: u32) -> u64 {
    let (w, h) = (f64::from(width), f64::from(height));
    let mut inside = 0;
    for y in 0..height {
        for x in 0..width {
            let cr = (f64::from(x) - w / 2.0) * 4.0 / w;
            let ci = (f64::from(y) - h / 2.0) * 4.0 / w;
            let (mut zr, mut zi) = (0.0f64, 0.0f64);
            let mut i = 0;
            while zr * zr + zi * zi <= 4.0 && i < max_iter {
                let tmp = zr * zr - zi * zi + cr;
                zi = 2.0 * zr * zi + ci;
                zr = tmp;
                i += 1;
            }
            if i == max_iter {
                inside += 1;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandelbrot_counts_bounded_points_only() {
        // The grid centre is c = 0, which never escapes; the corners do.
        let inside = mandelbrot(40, 30, 100);
        assert!(inside > 0);
        assert!(inside < 40 * 30);
        assert_eq!(inside, mandelbrot(40, 30, 100));
    }
}
