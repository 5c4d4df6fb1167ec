use std::path::Path;

use axum::extract::multipart::Field;
use futures_util::{StreamExt, TryStreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::infrastructure::storage::{BlobStore, ByteStream, StoreResult};

/// Content type for an uploaded part, preferring what the client sent.
pub fn field_content_type(field: &Field<'_>, file_name: &str) -> String {
    field
        .content_type()
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string()
        })
}

/// Streams a multipart field straight into the blob store without buffering the
/// whole file. Returns the number of bytes stored.
pub async fn stream_field_to_store(
    store: &dyn BlobStore,
    field: Field<'_>,
    key: &str,
    content_type: &str,
) -> StoreResult<u64> {
    let body: ByteStream<'_> = field.map_err(std::io::Error::other).boxed();
    store.put(key, content_type, body).await
}

/// Streams a local file into the blob store.
pub async fn stream_file_to_store(
    store: &dyn BlobStore,
    path: &Path,
    key: &str,
    content_type: &str,
) -> StoreResult<u64> {
    let file = tokio::fs::File::open(path).await?;
    store.put(key, content_type, ReaderStream::new(file).boxed()).await
}

/// Copies a blob body to a local file, returning the number of bytes written.
pub async fn stream_to_file(mut body: ByteStream<'_>, path: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
