use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::JobError;

/// Namespace for transcoded outputs in the blob store.
pub const OUTPUT_PREFIX: &str = "outputs";
/// Namespace for uploaded and generated sources in the blob store.
pub const UPLOAD_PREFIX: &str = "uploads";
pub const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Longest diagnostic kept on a failed job.
pub const MAX_DIAGNOSTIC_CHARS: usize = 1000;

pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Keeps the last `max` characters of `text`, on a char boundary.
pub fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Preset {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::P360, Preset::P480, Preset::P720, Preset::P1080];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::P360 => "360p",
            Preset::P480 => "480p",
            Preset::P720 => "720p",
            Preset::P1080 => "1080p",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Resolves a client-supplied preset. Missing values mean 720p. Unknown
    /// values also mean 720p unless `strict` is set.
    pub fn resolve(raw: Option<&str>, strict: bool) -> Result<Self, JobError> {
        let Some(raw) = raw else {
            return Ok(Preset::default());
        };
        match Self::parse(raw) {
            Some(preset) => Ok(preset),
            None if strict => Err(JobError::Validation(format!("unknown preset '{}'", raw))),
            None => {
                warn!(preset = %raw, "unknown preset, falling back to 720p");
                Ok(Preset::P720)
            }
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Finished,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(JobStatus::Running),
            "finished" => Some(JobStatus::Finished),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub owner: String,
    pub original_name: String,
    pub storage_key: String,
    pub size_bytes: u64,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

impl FileRecord {
    /// Storage key for a new source file, keeping the original extension.
    pub fn storage_key_for(id: &str, original_name: &str) -> String {
        let ext = std::path::Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        format!("{}/{}.{}", UPLOAD_PREFIX, id, ext)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub owner: String,
    pub file_id: String,
    pub preset: Preset,
    pub status: JobStatus,
    pub output_key: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub finished_at: Option<OffsetDateTime>,
    pub error: Option<String>,
}

/// Terminal result recorded for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Finished { at: OffsetDateTime },
    Failed { message: String },
}

impl JobOutcome {
    pub fn finished_now() -> Self {
        JobOutcome::Finished { at: OffsetDateTime::now_utc() }
    }

    /// A failure whose message is cut down to the last `MAX_DIAGNOSTIC_CHARS`.
    pub fn failed(message: impl AsRef<str>) -> Self {
        let message = message.as_ref().trim();
        let message = if message.is_empty() { "unknown error" } else { message };
        JobOutcome::Failed {
            message: tail_chars(message, MAX_DIAGNOSTIC_CHARS).to_string(),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Finished { .. } => JobStatus::Finished,
            JobOutcome::Failed { .. } => JobStatus::Error,
        }
    }
}

impl Job {
    pub fn output_key_for(id: &str) -> String {
        format!("{}/{}.mp4", OUTPUT_PREFIX, id)
    }

    /// A fresh job in the `running` state with its output key reserved.
    pub fn start(owner: &str, file_id: &str, preset: Preset) -> Self {
        let id = new_id();
        Self {
            output_key: Self::output_key_for(&id),
            id,
            owner: owner.to_string(),
            file_id: file_id.to_string(),
            preset,
            status: JobStatus::Running,
            created_at: OffsetDateTime::now_utc(),
            finished_at: None,
            error: None,
        }
    }

    /// Moves a running job into its terminal state. Terminal jobs never change.
    pub fn apply(&mut self, outcome: &JobOutcome) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::Conflict(format!(
                "job {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        match outcome {
            JobOutcome::Finished { at } => {
                self.status = JobStatus::Finished;
                self.finished_at = Some(*at);
                self.error = None;
            }
            JobOutcome::Failed { message } => {
                self.status = JobStatus::Error;
                self.finished_at = None;
                self.error = Some(message.clone());
            }
        }
        Ok(())
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// File name offered to clients downloading the output.
    pub fn download_name(&self) -> String {
        self.output_key
            .rsplit('/')
            .next()
            .unwrap_or(self.output_key.as_str())
            .to_string()
    }
}
