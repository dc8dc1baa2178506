use dataset_client::ApiError;
use thiserror::Error;

/// Errors raised while building or running a job worker.
///
/// Every variant wraps the underlying failure unchanged; the worker never
/// classifies errors, retry decisions happen one layer up.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unsupported database type: {0}")]
    UnsupportedEngine(String),

    #[error(transparent)]
    Engine(anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("job cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, JobError>;
