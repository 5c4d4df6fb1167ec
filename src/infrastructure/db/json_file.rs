use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::RecordStore;
use crate::infrastructure::storage::StoreResult;
use crate::modules::video::model::{FileRecord, Job, JobOutcome, JobStatus};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    files: Vec<FileRecord>,
    #[serde(default)]
    jobs: Vec<Job>,
}

/// Record store kept as one JSON document on local disk.
///
/// The document is held in memory behind a lock and rewritten through a
/// temporary file plus rename on every mutation.
pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<Document>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let doc = match fs::read(&path).await {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => Document::default(),
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "✅ JSON record store at {} ({} files, {} jobs)",
            path.display(),
            doc.files.len(),
            doc.jobs.len()
        );

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    async fn persist(path: &Path, doc: &Document) -> StoreResult<()> {
        let raw = serde_json::to_vec_pretty(doc)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// Copy of `items` with any entry matching `same` replaced by `item`.
fn upserted<T: Clone>(items: &[T], item: &T, same: impl Fn(&T) -> bool) -> Vec<T> {
    items
        .iter()
        .filter(|existing| !same(*existing))
        .cloned()
        .chain(std::iter::once(item.clone()))
        .collect()
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> OffsetDateTime) -> Vec<T> {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn put_file(&self, file: &FileRecord) -> StoreResult<()> {
        let mut doc = self.doc.write().await;
        let updated = upserted(&doc.files, file, |f| f.id == file.id);
        let previous = std::mem::replace(&mut doc.files, updated);
        if let Err(e) = Self::persist(&self.path, &doc).await {
            doc.files = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn get_file(&self, id: &str) -> StoreResult<Option<FileRecord>> {
        let doc = self.doc.read().await;
        Ok(doc.files.iter().find(|f| f.id == id).cloned())
    }

    async fn list_files_by_owner(&self, owner: &str) -> StoreResult<Vec<FileRecord>> {
        let doc = self.doc.read().await;
        let files = doc.files.iter().filter(|f| f.owner == owner).cloned().collect();
        Ok(newest_first(files, |f| f.created_at))
    }

    async fn put_job(&self, job: &Job) -> StoreResult<()> {
        let mut doc = self.doc.write().await;
        let updated = upserted(&doc.jobs, job, |j| j.id == job.id);
        let previous = std::mem::replace(&mut doc.jobs, updated);
        if let Err(e) = Self::persist(&self.path, &doc).await {
            doc.jobs = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> StoreResult<Option<Job>> {
        let doc = self.doc.read().await;
        Ok(doc.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn list_jobs_by_owner(&self, owner: &str) -> StoreResult<Vec<Job>> {
        let doc = self.doc.read().await;
        let jobs = doc.jobs.iter().filter(|j| j.owner == owner).cloned().collect();
        Ok(newest_first(jobs, |j| j.created_at))
    }

    async fn complete_job(&self, id: &str, outcome: &JobOutcome) -> StoreResult<bool> {
        let mut doc = self.doc.write().await;
        let Some(idx) = doc.jobs.iter().position(|j| j.id == id) else {
            return Ok(false);
        };

        let mut updated = doc.jobs[idx].clone();
        if updated.apply(outcome).is_err() {
            warn!(job_id = %id, status = updated.status.as_str(), "ignoring terminal write to finished job");
            return Ok(false);
        }

        // Memory only changes once the new document is on disk.
        let previous = std::mem::replace(&mut doc.jobs[idx], updated);
        if let Err(e) = Self::persist(&self.path, &doc).await {
            doc.jobs[idx] = previous;
            return Err(e);
        }
        Ok(true)
    }

    async fn list_running_before(&self, cutoff: OffsetDateTime) -> StoreResult<Vec<Job>> {
        let doc = self.doc.read().await;
        Ok(doc
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running && j.created_at < cutoff)
            .cloned()
            .collect())
    }
}
