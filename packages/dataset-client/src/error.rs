//! Error types for the dataset client.

use thiserror::Error;

use crate::types::RemoteFault;

/// Result type for dataset client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Dataset client errors.
///
/// Transport failures (`Transport`, `Status`) and in-envelope faults
/// (`Remote`) are separate channels; callers must handle both.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Base URL or access token not configured
    #[error("api client: missing request context")]
    MissingContext,

    /// Network error (connection failed, timeout, invalid request)
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-200 response from the command/query endpoint
    #[error("unexpected response status code: {status}, body: {body}")]
    Status { status: u16, body: String },

    /// Structured fault returned inside the response envelope
    #[error(transparent)]
    Remote(#[from] RemoteFault),

    /// Envelope or payload did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Non-200 response from the upload endpoint
    #[error("upload failed with status {status}: {body}")]
    Upload { status: u16, body: String },

    /// Local file could not be opened or inspected
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
