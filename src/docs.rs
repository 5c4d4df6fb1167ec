use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::common::response::ErrorBody;
use crate::modules::auth::dto::{AuthResponse, LoginRequest, UserResponse};
use crate::modules::auth::model::UserRole;
use crate::modules::health::handler::{CpuResponse, HealthResponse, IndexResponse};
use crate::modules::video::dto::{FileResponse, FilesResponse, JobResponse, JobsResponse, TranscodeRequest};
use crate::modules::video::model::{FileRecord, Job, JobStatus, Preset};
use crate::workers::transcoder::QueueStats;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::handler::login,
        crate::modules::video::handler::upload,
        crate::modules::video::handler::generate_sample,
        crate::modules::video::handler::transcode,
        crate::modules::video::handler::list_files,
        crate::modules::video::handler::list_jobs,
        crate::modules::video::handler::get_job,
        crate::modules::video::handler::download,
        crate::modules::health::handler::index,
        crate::modules::health::handler::health,
        crate::modules::health::handler::cpu,
    ),
    components(
        schemas(
            LoginRequest, AuthResponse, UserResponse, UserRole, ErrorBody,
            TranscodeRequest, FileResponse, FilesResponse, JobResponse, JobsResponse,
            FileRecord, Job, JobStatus, Preset,
            IndexResponse, HealthResponse, CpuResponse, QueueStats,
        )
    ),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Videos", description = "Uploads, transcode jobs and downloads"),
        (name = "Health", description = "Liveness and load testing")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api",
            "/api/auth/login",
            "/api/videos/upload",
            "/api/videos/transcode",
            "/api/videos/job/{id}",
            "/api/videos/download/{jobId}",
            "/api/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
