use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{validate_key, BlobObject, BlobStore, ByteStream, StoreError, StoreResult};

/// Blob store backed by a directory tree; keys map to relative paths.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("✅ Local blob store at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

async fn write_stream(path: &Path, mut body: ByteStream<'_>) -> StoreResult<u64> {
    let mut file = fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put<'a>(&self, key: &str, content_type: &str, body: ByteStream<'a>) -> StoreResult<u64> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Written beside the target and renamed so readers never see a partial object.
        let partial = path.with_extension(format!("partial-{}", uuid::Uuid::new_v4().simple()));
        let written = match write_stream(&partial, body).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!(key, content_type, bytes = written, "stored blob");
        Ok(written)
    }

    async fn get(&self, key: &str) -> StoreResult<BlobObject> {
        let path = self.path_for(key)?;
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let content_length = file.metadata().await.ok().map(|m| m.len());
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        Ok(BlobObject {
            body: ReaderStream::new(file).boxed(),
            content_type,
            content_length,
        })
    }
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
