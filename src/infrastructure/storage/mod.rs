use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub mod local;
pub mod s3;

/// Chunked body flowing in or out of a blob store.
pub type ByteStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    Missing(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("blob store error: {0}")]
    Blob(String),

    #[error("record store error: {0}")]
    Record(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Record(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Record(e.to_string())
    }
}

pub struct BlobObject {
    pub body: ByteStream<'static>,
    pub content_type: String,
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streams `body` to `key`. The object becomes visible only once the whole
    /// body is stored. Returns the number of bytes written.
    async fn put<'a>(&self, key: &str, content_type: &str, body: ByteStream<'a>) -> StoreResult<u64>;

    async fn get(&self, key: &str) -> StoreResult<BlobObject>;

    /// Removes `key`. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Rejects keys that could escape the store's namespace.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_must_stay_inside_the_namespace() {
        assert!(validate_key("uploads/abc.mp4").is_ok());
        assert!(validate_key("outputs/abc.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("uploads/../../etc").is_err());
        assert!(validate_key("uploads//x").is_err());
        assert!(validate_key("uploads\\x").is_err());
    }
}
