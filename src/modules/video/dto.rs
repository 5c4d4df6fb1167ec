use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::model::{FileRecord, Job};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "fileId is required"))]
    pub file_id: String,
    /// One of 360p, 480p, 720p, 1080p. Defaults to 720p.
    #[schema(example = "720p")]
    pub preset: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub file: FileRecord,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FilesResponse {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobResponse {
    pub job: Job,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobsResponse {
    pub jobs: Vec<Job>,
}
