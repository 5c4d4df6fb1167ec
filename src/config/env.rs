use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    StorageBackend,
    DataDir,
    PublicDir,
    TmpDir,
    DatabaseUrl,
    S3Endpoint,
    S3Bucket,
    S3Region,
    S3AccessKey,
    S3SecretKey,
    JwtSecret,
    TokenTtlHours,
    WorkerCount,
    QueueCapacity,
    StaleJobMinutes,
    StaleSweepIntervalSecs,
    FfmpegPath,
    StrictPresets,
    SampleDurationSecs,
    MaxUploadBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::StorageBackend => "STORAGE_BACKEND",
            EnvKey::DataDir => "DATA_DIR",
            EnvKey::PublicDir => "PUBLIC_DIR",
            EnvKey::TmpDir => "TMP_DIR",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::TokenTtlHours => "TOKEN_TTL_HOURS",
            EnvKey::WorkerCount => "WORKER_COUNT",
            EnvKey::QueueCapacity => "QUEUE_CAPACITY",
            EnvKey::StaleJobMinutes => "STALE_JOB_MINUTES",
            EnvKey::StaleSweepIntervalSecs => "STALE_SWEEP_INTERVAL_SECS",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::StrictPresets => "STRICT_PRESETS",
            EnvKey::SampleDurationSecs => "SAMPLE_DURATION_SECS",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

pub fn get_flag(key: EnvKey) -> bool {
    matches!(
        get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}
