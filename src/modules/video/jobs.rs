use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use super::error::{JobError, JobResult};
use super::model::{FileRecord, Job, JobOutcome, JobStatus, Preset};
use crate::infrastructure::db::RecordStore;
use crate::infrastructure::storage::{BlobStore, ByteStream};
use crate::workers::transcoder::{Dispatcher, QueueStats, WorkItem};

/// A finished output ready to stream back to its owner.
pub struct Download {
    pub body: ByteStream<'static>,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub file_name: String,
}

/// Owns the job lifecycle: admission, persistence, dispatch and owner-scoped reads.
#[derive(Clone)]
pub struct JobManager {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    dispatcher: Dispatcher,
    strict_presets: bool,
    stale_after: Duration,
}

impl JobManager {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        dispatcher: Dispatcher,
        strict_presets: bool,
        stale_job_minutes: i64,
    ) -> Self {
        Self {
            records,
            blobs,
            dispatcher,
            strict_presets,
            stale_after: Duration::minutes(stale_job_minutes),
        }
    }

    /// Creates a `running` job for one of the owner's files and hands it to the
    /// worker pool. Returns as soon as the record is durable; the transcode
    /// itself happens in the background.
    pub async fn submit_job(&self, owner: &str, file_id: &str, preset: Option<&str>) -> JobResult<Job> {
        let source = self.owned_file(owner, file_id).await?;
        let preset = Preset::resolve(preset, self.strict_presets)?;

        if self.dispatcher.is_saturated() {
            warn!(owner, file_id, "transcode queue is full, rejecting job");
            return Err(JobError::Overloaded);
        }

        let job = Job::start(owner, &source.id, preset);
        self.records.put_job(&job).await?;
        info!(job_id = %job.id, owner, %preset, "🎬 job created");

        let item = WorkItem {
            job: job.clone(),
            source,
        };
        if let Err(e) = self.dispatcher.dispatch(item) {
            self.records
                .complete_job(&job.id, &JobOutcome::failed("job could not be queued"))
                .await?;
            return Err(e);
        }

        Ok(job)
    }

    pub async fn get_job(&self, owner: &str, job_id: &str) -> JobResult<Job> {
        self.records
            .get_job(job_id)
            .await?
            .filter(|job| job.is_owned_by(owner))
            .ok_or(JobError::NotFound("job"))
    }

    pub async fn list_jobs(&self, owner: &str) -> JobResult<Vec<Job>> {
        Ok(self.records.list_jobs_by_owner(owner).await?)
    }

    pub async fn list_files(&self, owner: &str) -> JobResult<Vec<FileRecord>> {
        Ok(self.records.list_files_by_owner(owner).await?)
    }

    pub async fn download_output(&self, owner: &str, job_id: &str) -> JobResult<Download> {
        let job = self.get_job(owner, job_id).await?;
        if job.status != JobStatus::Finished {
            return Err(JobError::Conflict(format!(
                "job {} is not finished (status: {})",
                job.id,
                job.status.as_str()
            )));
        }

        let object = self.blobs.get(&job.output_key).await?;
        Ok(Download {
            body: object.body,
            content_type: object.content_type,
            content_length: object.content_length,
            file_name: job.download_name(),
        })
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.dispatcher.stats()
    }

    /// Closes jobs that have been running longer than the stale threshold.
    /// Returns how many were closed by this call.
    pub async fn expire_stale_jobs(&self, now: OffsetDateTime) -> JobResult<usize> {
        let cutoff = now - self.stale_after;
        let stale = self.records.list_running_before(cutoff).await?;

        let outcome = JobOutcome::failed(format!(
            "timeout: job did not complete within {} minutes",
            self.stale_after.whole_minutes()
        ));

        let mut expired = 0;
        for job in stale {
            if self.records.complete_job(&job.id, &outcome).await? {
                warn!(job_id = %job.id, owner = %job.owner, "⏱️ expired stale job");
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn owned_file(&self, owner: &str, file_id: &str) -> JobResult<FileRecord> {
        self.records
            .get_file(file_id)
            .await?
            .filter(|file| file.owner == owner)
            .ok_or(JobError::NotFound("file"))
    }
}
