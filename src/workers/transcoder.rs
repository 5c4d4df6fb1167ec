use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::common::upload::{stream_file_to_store, stream_to_file};
use crate::infrastructure::db::RecordStore;
use crate::infrastructure::ffmpeg::Transcoder;
use crate::infrastructure::storage::BlobStore;
use crate::modules::video::error::{JobError, JobResult};
use crate::modules::video::model::{FileRecord, Job, JobOutcome, JobStatus, OUTPUT_CONTENT_TYPE};

/// One dispatched transcode: the persisted job plus its source file.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub job: Job,
    pub source: FileRecord,
}

/// Everything a worker needs to process a job.
#[derive(Clone)]
pub struct WorkerContext {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub tmp_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
pub struct QueueStats {
    pub depth: usize,
    pub capacity: usize,
    pub workers: usize,
}

/// Sending half of the worker pool.
#[derive(Clone)]
pub struct Dispatcher {
    tx: Sender<WorkItem>,
    workers: usize,
}

impl Dispatcher {
    pub fn is_saturated(&self) -> bool {
        self.tx.is_full()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.tx.len(),
            capacity: self.tx.capacity().unwrap_or(0),
            workers: self.workers,
        }
    }

    /// Queues one job without waiting. A queue that filled up after the
    /// caller's admission check counts as overloaded.
    pub fn dispatch(&self, item: WorkItem) -> JobResult<()> {
        self.tx.try_send(item).map_err(|e| {
            match &e {
                TrySendError::Full(item) => {
                    warn!(job_id = %item.job.id, "transcode queue filled up, job not queued")
                }
                TrySendError::Closed(item) => {
                    error!(job_id = %item.job.id, "transcode workers are gone, job not queued")
                }
            }
            JobError::Overloaded
        })
    }
}

pub struct TranscodePool;

impl TranscodePool {
    /// Starts `workers` tasks draining a queue of at most `capacity` jobs.
    pub fn spawn(workers: usize, capacity: usize, ctx: WorkerContext) -> Dispatcher {
        let workers = workers.max(1);
        let (tx, rx) = async_channel::bounded(capacity.max(1));

        for worker_id in 0..workers {
            tokio::spawn(run_worker(worker_id, rx.clone(), ctx.clone()));
        }

        info!("🎥 Transcoder pool started: {} workers, queue capacity {}", workers, capacity.max(1));
        Dispatcher { tx, workers }
    }
}

async fn run_worker(worker_id: usize, rx: Receiver<WorkItem>, ctx: WorkerContext) {
    while let Ok(item) = rx.recv().await {
        let job_id = item.job.id.clone();
        let output_key = item.job.output_key.clone();

        // The stale sweep may have closed the job while it sat in the queue.
        if !still_running(ctx.records.as_ref(), &job_id).await {
            info!(worker_id, job_id = %job_id, "⏭️ job already closed, skipping");
            continue;
        }
        info!(worker_id, job_id = %job_id, preset = %item.job.preset, "📦 picked up job");

        // A panicking transcode must not take the worker down with it.
        let task_ctx = ctx.clone();
        let outcome = match tokio::spawn(async move { process_job(&task_ctx, &item).await }).await {
            Ok(Ok(())) => JobOutcome::finished_now(),
            Ok(Err(e)) => {
                warn!(worker_id, job_id = %job_id, error = %e, "❌ job failed");
                JobOutcome::failed(e.to_string())
            }
            Err(join_err) => {
                error!(worker_id, job_id = %job_id, "❌ job task aborted: {}", join_err);
                JobOutcome::failed(format!("worker crashed: {}", join_err))
            }
        };

        let applied = record_outcome(ctx.records.as_ref(), &job_id, &outcome).await;
        if !applied && outcome.status() == JobStatus::Finished {
            discard_output(ctx.blobs.as_ref(), &job_id, &output_key).await;
        }
    }

    info!(worker_id, "transcoder worker stopped");
}

/// Download, transcode and upload in a scratch directory that is removed on
/// every exit path.
async fn process_job(ctx: &WorkerContext, item: &WorkItem) -> JobResult<()> {
    let workdir = tempfile::Builder::new()
        .prefix(&format!("job-{}-", item.job.id))
        .tempdir_in(&ctx.tmp_dir)?;

    let input = workdir.path().join(input_name(&item.source.storage_key));
    let output = workdir.path().join("output.mp4");

    let source = ctx.blobs.get(&item.source.storage_key).await?;
    let fetched = stream_to_file(source.body, &input).await?;
    info!(job_id = %item.job.id, bytes = fetched, "⬇️ source downloaded");

    ctx.transcoder
        .transcode(&input, &output, item.job.preset)
        .await?;

    if !still_running(ctx.records.as_ref(), &item.job.id).await {
        return Err(JobError::Conflict(format!(
            "job {} was closed before its output was stored",
            item.job.id
        )));
    }

    let stored = stream_file_to_store(
        ctx.blobs.as_ref(),
        &output,
        &item.job.output_key,
        OUTPUT_CONTENT_TYPE,
    )
    .await?;
    info!(job_id = %item.job.id, bytes = stored, key = %item.job.output_key, "⬆️ output stored");

    Ok(())
}

fn input_name(storage_key: &str) -> String {
    match Path::new(storage_key).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("input.{}", ext),
        None => "input".to_string(),
    }
}

/// Re-reads the job. A store error counts as still running so the terminal
/// write stays the deciding step.
async fn still_running(records: &dyn RecordStore, job_id: &str) -> bool {
    match records.get_job(job_id).await {
        Ok(Some(job)) => job.status == JobStatus::Running,
        Ok(None) => false,
        Err(e) => {
            warn!(job_id, error = %e, "could not re-read job status");
            true
        }
    }
}

/// Returns whether the outcome is now the job's terminal state.
async fn record_outcome(records: &dyn RecordStore, job_id: &str, outcome: &JobOutcome) -> bool {
    match records.complete_job(job_id, outcome).await {
        Ok(true) => {
            info!(job_id, status = outcome.status().as_str(), "✅ job completed");
            true
        }
        Ok(false) => {
            warn!(job_id, "job was already terminal, outcome discarded");
            false
        }
        Err(e) => {
            error!(
                job_id,
                error = %e,
                "stuck job: could not record outcome, left running for the stale sweep"
            );
            false
        }
    }
}

/// An output is only reachable for a job whose record says `finished`.
async fn discard_output(blobs: &dyn BlobStore, job_id: &str, output_key: &str) {
    match blobs.delete(output_key).await {
        Ok(()) => warn!(job_id, key = output_key, "🗑️ removed output of a job that did not finish"),
        Err(e) => error!(job_id, key = output_key, error = %e, "could not remove orphaned output"),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::{stream, StreamExt};
    use time::{Duration, OffsetDateTime};
    use tokio::sync::Semaphore;

    use super::*;
    use crate::infrastructure::storage::StoreError;
    use crate::modules::video::model::Preset;
    use crate::modules::video::testing::{
        leftover_job_dirs, seed_file, wait_for_terminal, CopyTranscoder, FailingTranscoder, GatedTranscoder,
        TestApp,
    };

    async fn output_missing(app: &TestApp, job: &Job) -> bool {
        matches!(app.blobs.get(&job.output_key).await, Err(StoreError::Missing(_)))
    }

    #[test]
    fn input_names_keep_the_source_extension() {
        assert_eq!(input_name("uploads/abc.mov"), "input.mov");
        assert_eq!(input_name("uploads/abc"), "input");
    }

    fn work_item() -> WorkItem {
        let job = Job::start("2", "f1", Preset::P720);
        let source = FileRecord {
            id: "f1".to_string(),
            owner: "2".to_string(),
            original_name: "clip.mp4".to_string(),
            storage_key: "uploads/f1.mp4".to_string(),
            size_bytes: 4,
            created_at: OffsetDateTime::now_utc(),
        };
        WorkItem { job, source }
    }

    #[test]
    fn dispatch_never_waits_for_a_slot() {
        let (tx, rx) = async_channel::bounded(1);
        let dispatcher = Dispatcher { tx, workers: 1 };

        dispatcher.dispatch(work_item()).unwrap();
        assert!(dispatcher.is_saturated());
        assert!(matches!(dispatcher.dispatch(work_item()), Err(JobError::Overloaded)));
        assert_eq!(dispatcher.stats().depth, 1);

        drop(rx);
        assert!(matches!(dispatcher.dispatch(work_item()), Err(JobError::Overloaded)));
    }

    #[tokio::test]
    async fn scratch_dirs_are_removed_after_success_and_failure() {
        let ok = TestApp::start(Arc::new(CopyTranscoder)).await;
        let file = seed_file(&ok, "2", b"fine").await;
        let job = ok.state.jobs.submit_job("2", &file.id, None).await.unwrap();
        assert_eq!(wait_for_terminal(&ok, "2", &job.id).await.status, JobStatus::Finished);
        assert!(leftover_job_dirs(&ok).is_empty());

        let bad = TestApp::start(Arc::new(FailingTranscoder)).await;
        let file = seed_file(&bad, "2", b"broken").await;
        let job = bad.state.jobs.submit_job("2", &file.id, None).await.unwrap();
        assert_eq!(wait_for_terminal(&bad, "2", &job.id).await.status, JobStatus::Error);
        assert!(leftover_job_dirs(&bad).is_empty());
    }

    #[tokio::test]
    async fn missing_source_blob_fails_the_job() {
        let app = TestApp::start(Arc::new(CopyTranscoder)).await;
        let file = seed_file(&app, "2", b"soon gone").await;
        app.blobs.delete(&file.storage_key).await.unwrap();

        let job = app.state.jobs.submit_job("2", &file.id, None).await.unwrap();
        let done = wait_for_terminal(&app, "2", &job.id).await;

        assert_eq!(done.status, JobStatus::Error);
        assert!(done.error.unwrap().contains("not found"));
        assert!(output_missing(&app, &job).await);
        assert!(leftover_job_dirs(&app).is_empty());
    }

    #[tokio::test]
    async fn rejected_output_upload_fails_the_job() {
        let app = TestApp::start_rejecting_outputs(Arc::new(CopyTranscoder)).await;
        let file = seed_file(&app, "2", b"will not land").await;

        let job = app.state.jobs.submit_job("2", &file.id, Some("1080p")).await.unwrap();
        let done = wait_for_terminal(&app, "2", &job.id).await;

        assert_eq!(done.status, JobStatus::Error);
        assert!(done.error.unwrap().contains("disk quota exceeded"));
        assert!(output_missing(&app, &job).await);
        assert!(leftover_job_dirs(&app).is_empty());
    }

    #[tokio::test]
    async fn jobs_closed_by_the_stale_sweep_never_publish_output() {
        let gate = Arc::new(Semaphore::new(0));
        let transcoder = Arc::new(GatedTranscoder::new(gate.clone()));
        let app = TestApp::start_with(transcoder.clone(), 1, 4).await;
        let file = seed_file(&app, "2", b"slow").await;

        // `running` is mid-transcode on the only worker, `queued` waits behind it.
        let running = app.state.jobs.submit_job("2", &file.id, None).await.unwrap();
        let queued = app.state.jobs.submit_job("2", &file.id, None).await.unwrap();
        for _ in 0..500 {
            if transcoder.started() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(transcoder.started(), 1);

        let later = OffsetDateTime::now_utc() + Duration::hours(3);
        assert_eq!(app.state.jobs.expire_stale_jobs(later).await.unwrap(), 2);

        // A fresh job behind them shows when the worker has drained the queue.
        let fresh = app.state.jobs.submit_job("2", &file.id, None).await.unwrap();
        gate.add_permits(3);
        assert_eq!(wait_for_terminal(&app, "2", &fresh.id).await.status, JobStatus::Finished);

        assert_eq!(transcoder.started(), 2);
        for job in [&running, &queued] {
            let closed = app.state.jobs.get_job("2", &job.id).await.unwrap();
            assert_eq!(closed.status, JobStatus::Error);
            assert!(closed.error.unwrap().starts_with("timeout:"));
            assert!(output_missing(&app, job).await);
        }
        assert!(leftover_job_dirs(&app).is_empty());
    }

    #[tokio::test]
    async fn output_of_an_unrecorded_finish_is_discarded() {
        let app = TestApp::start(Arc::new(CopyTranscoder)).await;
        let job = Job::start("2", "f1", Preset::P720);

        let body = stream::once(async { Ok::<_, std::io::Error>(Bytes::from_static(b"late")) }).boxed();
        app.blobs.put(&job.output_key, OUTPUT_CONTENT_TYPE, body).await.unwrap();

        // No record exists, so the finish cannot be applied.
        assert!(!record_outcome(app.records.as_ref(), &job.id, &JobOutcome::finished_now()).await);
        discard_output(app.blobs.as_ref(), &job.id, &job.output_key).await;
        assert!(output_missing(&app, &job).await);
    }
}
