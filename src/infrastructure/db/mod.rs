use async_trait::async_trait;
use time::OffsetDateTime;

use crate::infrastructure::storage::StoreResult;
use crate::modules::video::model::{FileRecord, Job, JobOutcome};

pub mod json_file;
pub mod pool;
pub mod postgres;

/// Durable storage for file and job records.
///
/// Single-record reads and writes are atomic. Owner queries return records
/// newest `created_at` first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_file(&self, file: &FileRecord) -> StoreResult<()>;

    async fn get_file(&self, id: &str) -> StoreResult<Option<FileRecord>>;

    async fn list_files_by_owner(&self, owner: &str) -> StoreResult<Vec<FileRecord>>;

    async fn put_job(&self, job: &Job) -> StoreResult<()>;

    async fn get_job(&self, id: &str) -> StoreResult<Option<Job>>;

    async fn list_jobs_by_owner(&self, owner: &str) -> StoreResult<Vec<Job>>;

    /// Records the terminal outcome of a job, but only while it is still
    /// running. Returns `false` when the job was missing or already terminal.
    async fn complete_job(&self, id: &str, outcome: &JobOutcome) -> StoreResult<bool>;

    /// Jobs still running that were created before `cutoff`.
    async fn list_running_before(&self, cutoff: OffsetDateTime) -> StoreResult<Vec<Job>>;
}
