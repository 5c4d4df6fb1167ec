use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod handler;
pub mod jobs;
pub mod model;
pub mod service;

#[cfg(test)]
pub mod testing;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/upload", post(handler::upload))
        .route("/generate-sample", post(handler::generate_sample))
        .route("/transcode", post(handler::transcode))
        .route("/files", get(handler::list_files))
        .route("/jobs", get(handler::list_jobs))
        .route("/job/{id}", get(handler::get_job))
        .route("/download/{job_id}", get(handler::download))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
