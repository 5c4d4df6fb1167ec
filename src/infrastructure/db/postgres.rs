use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use super::pool::DbPool;
use super::RecordStore;
use crate::infrastructure::storage::{StoreError, StoreResult};
use crate::modules::video::model::{FileRecord, Job, JobOutcome, JobStatus, Preset};

#[derive(Debug, FromRow)]
struct FileRow {
    id: String,
    owner: String,
    original_name: String,
    storage_key: String,
    size_bytes: i64,
    created_at: OffsetDateTime,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        Self {
            id: row.id,
            owner: row.owner,
            original_name: row.original_name,
            storage_key: row.storage_key,
            size_bytes: u64::try_from(row.size_bytes).unwrap_or(0),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    owner: String,
    file_id: String,
    preset: String,
    status: String,
    output_key: String,
    created_at: OffsetDateTime,
    finished_at: Option<OffsetDateTime>,
    error: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let preset = Preset::parse(&row.preset)
            .ok_or_else(|| StoreError::Record(format!("job {} has unknown preset '{}'", row.id, row.preset)))?;
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Record(format!("job {} has unknown status '{}'", row.id, row.status)))?;

        Ok(Self {
            id: row.id,
            owner: row.owner,
            file_id: row.file_id,
            preset,
            status,
            output_key: row.output_key,
            created_at: row.created_at,
            finished_at: row.finished_at,
            error: row.error,
        })
    }
}

fn into_jobs(rows: Vec<JobRow>) -> StoreResult<Vec<Job>> {
    rows.into_iter().map(Job::try_from).collect()
}

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn put_file(&self, file: &FileRecord) -> StoreResult<()> {
        let size = i64::try_from(file.size_bytes)
            .map_err(|_| StoreError::Record(format!("file {} is too large", file.id)))?;

        sqlx::query(
            r#"
            INSERT INTO files (id, owner, original_name, storage_key, size_bytes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&file.id)
        .bind(&file.owner)
        .bind(&file.original_name)
        .bind(&file.storage_key)
        .bind(size)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_file(&self, id: &str) -> StoreResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT id, owner, original_name, storage_key, size_bytes, created_at FROM files WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRecord::from))
    }

    async fn list_files_by_owner(&self, owner: &str) -> StoreResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT id, owner, original_name, storage_key, size_bytes, created_at FROM files WHERE owner = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    async fn put_job(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, owner, file_id, preset, status, output_key, created_at, finished_at, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&job.id)
        .bind(&job.owner)
        .bind(&job.file_id)
        .bind(job.preset.as_str())
        .bind(job.status.as_str())
        .bind(&job.output_key)
        .bind(job.created_at)
        .bind(job.finished_at)
        .bind(&job.error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_job(&self, id: &str) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, owner, file_id, preset, status, output_key, created_at, finished_at, error FROM jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn list_jobs_by_owner(&self, owner: &str) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT id, owner, file_id, preset, status, output_key, created_at, finished_at, error FROM jobs WHERE owner = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        into_jobs(rows)
    }

    async fn complete_job(&self, id: &str, outcome: &JobOutcome) -> StoreResult<bool> {
        let (finished_at, error) = match outcome {
            JobOutcome::Finished { at } => (Some(*at), None),
            JobOutcome::Failed { message } => (None, Some(message.as_str())),
        };

        // The status guard keeps terminal jobs terminal.
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, finished_at = $3, error = $4
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(outcome.status().as_str())
        .bind(finished_at)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_running_before(&self, cutoff: OffsetDateTime) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT id, owner, file_id, preset, status, output_key, created_at, finished_at, error FROM jobs WHERE status = 'running' AND created_at < $1 ORDER BY created_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        into_jobs(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(preset: &str, status: &str) -> JobRow {
        JobRow {
            id: "j1".to_string(),
            owner: "1".to_string(),
            file_id: "f1".to_string(),
            preset: preset.to_string(),
            status: status.to_string(),
            output_key: "outputs/j1.mp4".to_string(),
            created_at: OffsetDateTime::now_utc(),
            finished_at: None,
            error: Some("boom".to_string()),
        }
    }

    #[test]
    fn job_rows_map_onto_the_domain_type() {
        let job = Job::try_from(row("1080p", "error")).unwrap();
        assert_eq!(job.preset, Preset::P1080);
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn corrupt_job_rows_are_store_errors() {
        assert!(matches!(Job::try_from(row("8k", "running")), Err(StoreError::Record(_))));
        assert!(matches!(Job::try_from(row("720p", "paused")), Err(StoreError::Record(_))));
    }
}
