use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::settings::{AppConfig, StorageBackend};
use crate::infrastructure::db::json_file::JsonFileStore;
use crate::infrastructure::db::pool::{connect_to_db, run_migrations};
use crate::infrastructure::db::postgres::PgRecordStore;
use crate::infrastructure::db::RecordStore;
use crate::infrastructure::ffmpeg::{FfmpegRunner, Transcoder};
use crate::infrastructure::storage::local::LocalBlobStore;
use crate::infrastructure::storage::s3::S3BlobStore;
use crate::infrastructure::storage::BlobStore;
use crate::modules::auth::service::CredentialService;
use crate::modules::video::jobs::JobManager;
use crate::modules::video::service::FileService;
use crate::workers::transcoder::{TranscodePool, WorkerContext};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub credentials: CredentialService,
    pub jobs: JobManager,
    pub files: FileService,
}

impl AppState {
    /// Opens the configured storage backend and starts the transcode workers.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let (records, blobs) = open_stores(&config).await?;
        let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegRunner::new(config.ffmpeg_path.clone()));
        Self::with_parts(config, records, blobs, transcoder).await
    }

    pub async fn with_parts(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.tmp_dir)
            .await
            .with_context(|| format!("cannot create temp dir {}", config.tmp_dir.display()))?;

        let credentials = CredentialService::new(&config.jwt_secret, config.token_ttl_hours)?;

        let dispatcher = TranscodePool::spawn(
            config.worker_count,
            config.queue_capacity,
            WorkerContext {
                records: records.clone(),
                blobs: blobs.clone(),
                transcoder: transcoder.clone(),
                tmp_dir: config.tmp_dir.clone(),
            },
        );

        let jobs = JobManager::new(
            records.clone(),
            blobs.clone(),
            dispatcher,
            config.strict_presets,
            config.stale_job_minutes,
        );
        let files = FileService::new(
            records,
            blobs,
            transcoder,
            config.tmp_dir.clone(),
            config.sample_duration_secs,
        );

        Ok(Self {
            config: Arc::new(config),
            credentials,
            jobs,
            files,
        })
    }
}

async fn open_stores(config: &AppConfig) -> Result<(Arc<dyn RecordStore>, Arc<dyn BlobStore>)> {
    match config.storage_backend {
        StorageBackend::Local => {
            let records = JsonFileStore::open(config.data_dir.join("db.json")).await?;
            let blobs = LocalBlobStore::new(config.data_dir.join("blobs")).await?;
            info!("✅ Local storage under {}", config.data_dir.display());
            Ok((Arc::new(records), Arc::new(blobs)))
        }
        StorageBackend::Cloud => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the cloud backend")?;
            let s3 = config
                .s3
                .as_ref()
                .context("S3 settings are required for the cloud backend")?;

            let pool = connect_to_db(url).await?;
            run_migrations(&pool).await?;
            let blobs = S3BlobStore::new(s3);
            info!("✅ Cloud storage: bucket {}", s3.bucket);
            Ok((Arc::new(PgRecordStore::new(pool)), Arc::new(blobs)))
        }
    }
}
