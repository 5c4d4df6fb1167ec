use thiserror::Error;

use crate::infrastructure::ffmpeg::ToolError;
use crate::infrastructure::storage::StoreError;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    /// Absent, or owned by someone else. Both look the same to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("transcode queue is full, try again later")]
    Overloaded,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}
