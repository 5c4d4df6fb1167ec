use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::config::env::{self, EnvKey};

/// Which pair of storage adapters backs the service.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory blob store plus a JSON document for records.
    Local,
    /// S3-compatible blob store plus PostgreSQL for records.
    Cloud,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "cloud" | "s3" => Ok(StorageBackend::Cloud),
            other => Err(anyhow!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub storage_backend: StorageBackend,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub database_url: Option<String>,
    pub s3: Option<S3Settings>,
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub stale_job_minutes: i64,
    pub stale_sweep_interval_secs: u64,
    pub ffmpeg_path: String,
    pub strict_presets: bool,
    pub sample_duration_secs: u32,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let storage_backend: StorageBackend = env::get_or(EnvKey::StorageBackend, "local").parse()?;

        let (database_url, s3) = match storage_backend {
            StorageBackend::Local => (None, None),
            StorageBackend::Cloud => (
                Some(env::get(EnvKey::DatabaseUrl).context("DATABASE_URL is required for the cloud backend")?),
                Some(S3Settings {
                    endpoint: env::get_opt(EnvKey::S3Endpoint),
                    bucket: env::get(EnvKey::S3Bucket).context("S3_BUCKET is required for the cloud backend")?,
                    region: env::get_or(EnvKey::S3Region, "us-east-1"),
                    access_key: env::get(EnvKey::S3AccessKey).context("AWS_ACCESS_KEY_ID is required")?,
                    secret_key: env::get(EnvKey::S3SecretKey).context("AWS_SECRET_ACCESS_KEY is required")?,
                }),
            ),
        };

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 8080),
            storage_backend,
            data_dir: PathBuf::from(env::get_or(EnvKey::DataDir, "./data")),
            public_dir: PathBuf::from(env::get_or(EnvKey::PublicDir, "./public")),
            tmp_dir: env::get_opt(EnvKey::TmpDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            database_url,
            s3,
            jwt_secret: env::get(EnvKey::JwtSecret).context("JWT_SECRET is required")?,
            token_ttl_hours: env::get_parsed(EnvKey::TokenTtlHours, 6),
            worker_count: env::get_parsed(EnvKey::WorkerCount, default_workers).max(1),
            queue_capacity: env::get_parsed(EnvKey::QueueCapacity, 32).max(1),
            stale_job_minutes: env::get_parsed(EnvKey::StaleJobMinutes, 120),
            stale_sweep_interval_secs: env::get_parsed(EnvKey::StaleSweepIntervalSecs, 60).max(1),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            strict_presets: env::get_flag(EnvKey::StrictPresets),
            sample_duration_secs: env::get_parsed(EnvKey::SampleDurationSecs, 60),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 1024 * 1024 * 1024),
        })
    }

    /// Settings for tests and local tooling: local backend rooted at `dir`.
    #[cfg(test)]
    pub fn for_local_dir(dir: &std::path::Path) -> Self {
        Self {
            server_port: 0,
            storage_backend: StorageBackend::Local,
            data_dir: dir.join("data"),
            public_dir: dir.join("public"),
            tmp_dir: dir.join("tmp"),
            database_url: None,
            s3: None,
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 6,
            worker_count: 2,
            queue_capacity: 8,
            stale_job_minutes: 120,
            stale_sweep_interval_secs: 60,
            ffmpeg_path: "ffmpeg".to_string(),
            strict_presets: false,
            sample_duration_secs: 1,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_backend_names() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("Cloud".parse::<StorageBackend>().unwrap(), StorageBackend::Cloud);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::Cloud);
        assert!("dynamo".parse::<StorageBackend>().is_err());
    }
}
