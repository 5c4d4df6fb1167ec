use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::Field;
use time::OffsetDateTime;
use tracing::info;

use super::error::JobResult;
use super::model::{new_id, FileRecord, OUTPUT_CONTENT_TYPE};
use crate::common::upload::{field_content_type, stream_field_to_store, stream_file_to_store};
use crate::infrastructure::db::RecordStore;
use crate::infrastructure::ffmpeg::Transcoder;
use crate::infrastructure::storage::BlobStore;

pub const SAMPLE_FILE_NAME: &str = "sample_generated.mp4";

/// Registers source videos, either uploaded or generated on the server.
#[derive(Clone)]
pub struct FileService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    transcoder: Arc<dyn Transcoder>,
    tmp_dir: PathBuf,
    sample_duration_secs: u32,
}

impl FileService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        tmp_dir: PathBuf,
        sample_duration_secs: u32,
    ) -> Self {
        Self {
            records,
            blobs,
            transcoder,
            tmp_dir,
            sample_duration_secs,
        }
    }

    /// Streams an uploaded multipart field into the blob store and records it.
    pub async fn store_upload(&self, owner: &str, field: Field<'_>) -> JobResult<FileRecord> {
        let original_name = field
            .file_name()
            .and_then(|name| name.rsplit(['/', '\\']).next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("upload.bin")
            .to_string();
        let content_type = field_content_type(&field, &original_name);

        let id = new_id();
        let storage_key = FileRecord::storage_key_for(&id, &original_name);
        let size = stream_field_to_store(self.blobs.as_ref(), field, &storage_key, &content_type).await?;

        self.register(owner, id, original_name, storage_key, size).await
    }

    /// Renders a synthetic test clip and stores it like an upload.
    pub async fn generate_sample(&self, owner: &str) -> JobResult<FileRecord> {
        let workdir = tempfile::Builder::new()
            .prefix("sample-")
            .tempdir_in(&self.tmp_dir)?;
        let output = workdir.path().join(SAMPLE_FILE_NAME);

        self.transcoder
            .generate_sample(&output, self.sample_duration_secs)
            .await?;

        let id = new_id();
        let storage_key = FileRecord::storage_key_for(&id, SAMPLE_FILE_NAME);
        let size = stream_file_to_store(self.blobs.as_ref(), &output, &storage_key, OUTPUT_CONTENT_TYPE).await?;

        self.register(owner, id, SAMPLE_FILE_NAME.to_string(), storage_key, size)
            .await
    }

    async fn register(
        &self,
        owner: &str,
        id: String,
        original_name: String,
        storage_key: String,
        size_bytes: u64,
    ) -> JobResult<FileRecord> {
        let file = FileRecord {
            id,
            owner: owner.to_string(),
            original_name,
            storage_key,
            size_bytes,
            created_at: OffsetDateTime::now_utc(),
        };
        self.records.put_file(&file).await?;

        info!(file_id = %file.id, owner, bytes = size_bytes, "📁 file stored");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {

    use futures_util::TryStreamExt;

    use super::*;
    use crate::modules::video::error::JobError;
    use crate::modules::video::testing::{CopyTranscoder, FailingTranscoder, TestApp};

    #[tokio::test]
    async fn generated_sample_is_stored_like_an_upload() {
        let app = TestApp::start(Arc::new(CopyTranscoder)).await;

        let file = app.state.files.generate_sample("2").await.unwrap();
        assert_eq!(file.original_name, SAMPLE_FILE_NAME);
        assert_eq!(file.owner, "2");
        assert!(file.storage_key.starts_with("uploads/"));
        assert!(file.storage_key.ends_with(".mp4"));

        let object = app.blobs.get(&file.storage_key).await.unwrap();
        let chunks: Vec<_> = object.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"sample:1s");
        assert_eq!(file.size_bytes, 9);

        let listed = app.state.jobs.list_files("2").await.unwrap();
        assert_eq!(listed, vec![file]);
    }

    #[tokio::test]
    async fn failed_sample_generation_records_nothing() {
        let app = TestApp::start(Arc::new(FailingTranscoder)).await;

        let err = app.state.files.generate_sample("2").await.unwrap_err();
        assert!(matches!(err, JobError::Tool(_)));
        assert!(app.state.jobs.list_files("2").await.unwrap().is_empty());
    }
}
