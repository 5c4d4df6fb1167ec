//! Fakes and fixtures shared by the video module tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use super::model::{new_id, FileRecord, Job, Preset, OUTPUT_PREFIX};
use crate::config::settings::AppConfig;
use crate::infrastructure::db::json_file::JsonFileStore;
use crate::infrastructure::db::RecordStore;
use crate::infrastructure::ffmpeg::{ToolError, Transcoder};
use crate::infrastructure::storage::local::LocalBlobStore;
use crate::infrastructure::storage::{BlobObject, BlobStore, ByteStream, StoreError, StoreResult};
use crate::state::AppState;

/// "Transcodes" by prefixing the input bytes with the preset name.
pub struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, preset: Preset) -> Result<(), ToolError> {
        let mut bytes = format!("{}:", preset).into_bytes();
        bytes.extend(tokio::fs::read(input).await.map_err(spawn_error)?);
        tokio::fs::write(output, bytes).await.map_err(spawn_error)
    }

    async fn generate_sample(&self, output: &Path, duration_secs: u32) -> Result<(), ToolError> {
        tokio::fs::write(output, format!("sample:{}s", duration_secs))
            .await
            .map_err(spawn_error)
    }
}

/// Blocks each transcode until the test hands out a permit.
pub struct GatedTranscoder {
    gate: Arc<Semaphore>,
    started: AtomicUsize,
}

impl GatedTranscoder {
    pub fn new(gate: Arc<Semaphore>) -> Self {
        Self {
            gate,
            started: AtomicUsize::new(0),
        }
    }

    /// Number of transcodes that have reached the gate.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for GatedTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, preset: Preset) -> Result<(), ToolError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.map_err(|e| spawn_error(std::io::Error::other(e)))?;
        permit.forget();
        CopyTranscoder.transcode(input, output, preset).await
    }

    async fn generate_sample(&self, output: &Path, duration_secs: u32) -> Result<(), ToolError> {
        CopyTranscoder.generate_sample(output, duration_secs).await
    }
}

/// Fails every run with a long diagnostic, as a broken input would.
pub struct FailingTranscoder;

impl FailingTranscoder {
    fn error() -> ToolError {
        let noise = "frame=0 fps=0.0 q=0.0 size=0kB\n".repeat(200);
        spawn_error(std::io::Error::other(format!("{}moov atom not found", noise)))
    }
}

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn transcode(&self, _input: &Path, _output: &Path, _preset: Preset) -> Result<(), ToolError> {
        Err(Self::error())
    }

    async fn generate_sample(&self, _output: &Path, _duration_secs: u32) -> Result<(), ToolError> {
        Err(Self::error())
    }
}

fn spawn_error(source: std::io::Error) -> ToolError {
    ToolError::Spawn {
        program: "fake-ffmpeg".to_string(),
        source,
    }
}

/// Local blob store that refuses every write under the outputs namespace.
pub struct OutputRejectingStore {
    inner: LocalBlobStore,
}

#[async_trait]
impl BlobStore for OutputRejectingStore {
    async fn put<'a>(&self, key: &str, content_type: &str, body: ByteStream<'a>) -> StoreResult<u64> {
        if key.starts_with(OUTPUT_PREFIX) {
            return Err(StoreError::Blob("disk quota exceeded".to_string()));
        }
        self.inner.put(key, content_type, body).await
    }

    async fn get(&self, key: &str) -> StoreResult<BlobObject> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }
}

/// A fully wired local-backend application rooted in a temp directory.
pub struct TestApp {
    _dir: TempDir,
    pub state: AppState,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl TestApp {
    pub async fn start(transcoder: Arc<dyn Transcoder>) -> Self {
        Self::start_with(transcoder, 2, 8).await
    }

    pub async fn start_with(transcoder: Arc<dyn Transcoder>, workers: usize, capacity: usize) -> Self {
        Self::build(transcoder, workers, capacity, |local| Arc::new(local) as Arc<dyn BlobStore>).await
    }

    /// Like [`TestApp::start`], but no output can ever be stored.
    pub async fn start_rejecting_outputs(transcoder: Arc<dyn Transcoder>) -> Self {
        Self::build(transcoder, 2, 8, |inner| {
            Arc::new(OutputRejectingStore { inner }) as Arc<dyn BlobStore>
        })
        .await
    }

    async fn build(
        transcoder: Arc<dyn Transcoder>,
        workers: usize,
        capacity: usize,
        wrap: impl FnOnce(LocalBlobStore) -> Arc<dyn BlobStore>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::for_local_dir(dir.path());
        config.worker_count = workers;
        config.queue_capacity = capacity;

        let records: Arc<dyn RecordStore> =
            Arc::new(JsonFileStore::open(config.data_dir.join("db.json")).await.unwrap());
        let blobs = wrap(LocalBlobStore::new(config.data_dir.join("blobs")).await.unwrap());

        let state = AppState::with_parts(config, records.clone(), blobs.clone(), transcoder)
            .await
            .unwrap();

        Self {
            _dir: dir,
            state,
            records,
            blobs,
        }
    }
}

/// Stores `bytes` as a source file owned by `owner`.
pub async fn seed_file(app: &TestApp, owner: &str, bytes: &'static [u8]) -> FileRecord {
    let id = new_id();
    let storage_key = FileRecord::storage_key_for(&id, "clip.mp4");
    let body = stream::once(async move { Ok::<_, std::io::Error>(Bytes::from_static(bytes)) }).boxed();
    let size = app.blobs.put(&storage_key, "video/mp4", body).await.unwrap();

    let file = FileRecord {
        id,
        owner: owner.to_string(),
        original_name: "clip.mp4".to_string(),
        storage_key,
        size_bytes: size,
        created_at: time::OffsetDateTime::now_utc(),
    };
    app.records.put_file(&file).await.unwrap();
    file
}

/// Polls until the job leaves `running`.
pub async fn wait_for_terminal(app: &TestApp, owner: &str, job_id: &str) -> Job {
    for _ in 0..500 {
        let job = app.state.jobs.get_job(owner, job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", job_id);
}

/// Job scratch directories still present under the app's temp dir.
pub fn leftover_job_dirs(app: &TestApp) -> Vec<String> {
    std::fs::read_dir(&app.state.config.tmp_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("job-"))
        .collect()
}
