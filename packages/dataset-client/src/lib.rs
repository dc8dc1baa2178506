//! Pure Polyteia dataset API client.
//!
//! A minimal client for the Polyteia platform API. Every call is a single
//! stateless round trip against one base URL, authenticated with a personal
//! access token:
//!
//! - `command` / `query` post `{"command"|"query": name, "params": ...}` to
//!   `/api` and unwrap the `{data | error}` response envelope.
//! - `upload` streams a file to `/upload` as multipart, authorized by a
//!   short-lived upload token.
//!
//! # Example
//!
//! ```rust,ignore
//! use dataset_client::{DatasetClient, DatasetUploadTokenRequest};
//!
//! let client = DatasetClient::new("pak_...", "https://app.polyteia.com");
//!
//! let token = client
//!     .generate_dataset_upload_token(DatasetUploadTokenRequest {
//!         id: "ds_123".into(),
//!         content_type: "application/vnd.apache.parquet".into(),
//!     })
//!     .await?;
//! client.upload_dataset(&token.token, "/tmp/export.parquet").await?;
//! ```

pub mod error;
pub mod types;

pub use error::{ApiError, Result};
pub use types::{
    ApiRequest, DatasetUploadTokenRequest, DatasetUploadTokenResponse, Envelope, RemoteFault,
    RequestKind,
};

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Production endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://app.polyteia.com";

/// Header carrying the upload token on `/upload` requests.
pub const UPLOAD_TOKEN_HEADER: &str = "X-Upload-Token";

const API_PATH: &str = "/api";
const UPLOAD_PATH: &str = "/upload";
const DOWNLOAD_PATH: &str = "/download";

const GENERATE_DATASET_UPLOAD_TOKEN: &str = "generate_dataset_upload_token";

#[derive(Clone)]
pub struct DatasetClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl DatasetClient {
    pub fn new(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a command request and decode its payload.
    pub async fn command<P, T>(&self, name: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.send(RequestKind::Command, name, params).await
    }

    /// Send a query request and decode its payload.
    pub async fn query<P, T>(&self, name: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.send(RequestKind::Query, name, params).await
    }

    /// Upload a file to `/upload` as the multipart field `file`.
    ///
    /// The file is opened before any request is made, so a missing path
    /// fails without touching the network.
    pub async fn upload(&self, upload_token: &str, file_path: impl AsRef<Path>) -> Result<()> {
        self.ensure_context()?;
        let file_path = file_path.as_ref();

        let file = tokio::fs::File::open(file_path).await?;
        let size = file.metadata().await?.len();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), size)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        debug!(file = %file_path.display(), size, "Uploading file");

        let resp = self
            .http
            .post(format!("{}{}", self.base_url, UPLOAD_PATH))
            .header(UPLOAD_TOKEN_HEADER, upload_token)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Upload {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Fetch the content behind a download token.
    pub async fn download(&self, download_token: &str) -> Result<Bytes> {
        self.ensure_context()?;

        let resp = self
            .http
            .get(format!("{}{}", self.base_url, DOWNLOAD_PATH))
            .bearer_auth(&self.access_token)
            .query(&[("token", download_token)])
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.bytes().await?)
    }

    /// Issue a single-use upload token scoped to one dataset and content type.
    pub async fn generate_dataset_upload_token(
        &self,
        request: DatasetUploadTokenRequest,
    ) -> Result<DatasetUploadTokenResponse> {
        self.command(GENERATE_DATASET_UPLOAD_TOKEN, &request).await
    }

    pub async fn upload_dataset(&self, token: &str, file_path: impl AsRef<Path>) -> Result<()> {
        self.upload(token, file_path).await
    }

    async fn send<P, T>(&self, kind: RequestKind, name: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.ensure_context()?;

        let request = ApiRequest { kind, name, params };
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, API_PATH))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        debug!(kind = kind.as_str(), name, status = status.as_u16(), "API response");

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        // An empty or `null` body carries no data
        let envelope = if body.iter().all(u8::is_ascii_whitespace) {
            Envelope::Empty
        } else {
            serde_json::from_slice::<Option<Envelope>>(&body)?.unwrap_or(Envelope::Empty)
        };

        envelope.decode()
    }

    fn ensure_context(&self) -> Result<()> {
        if self.base_url.is_empty() || self.access_token.is_empty() {
            return Err(ApiError::MissingContext);
        }
        Ok(())
    }
}
