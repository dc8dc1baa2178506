// Infrastructure traits for the job worker
//
// The worker only sequences calls; these seams let tests swap the
// analytical engine and the remote dataset API.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use dataset_client::{DatasetClient, DatasetUploadTokenRequest, DatasetUploadTokenResponse};

// =============================================================================
// Analytical Engine Trait
// =============================================================================

#[async_trait]
pub trait BaseAnalyticalEngine: Send + Sync {
    /// Execute a statement that returns no rows
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Release the connection. Called exactly once.
    fn close(self: Box<Self>) -> Result<()>;
}

// =============================================================================
// Dataset API Trait
// =============================================================================

#[async_trait]
pub trait BaseDatasetApi: Send + Sync {
    async fn generate_upload_token(
        &self,
        request: DatasetUploadTokenRequest,
    ) -> dataset_client::Result<DatasetUploadTokenResponse>;

    async fn upload_dataset(&self, token: &str, file_path: &Path) -> dataset_client::Result<()>;
}

#[async_trait]
impl BaseDatasetApi for DatasetClient {
    async fn generate_upload_token(
        &self,
        request: DatasetUploadTokenRequest,
    ) -> dataset_client::Result<DatasetUploadTokenResponse> {
        self.generate_dataset_upload_token(request).await
    }

    async fn upload_dataset(&self, token: &str, file_path: &Path) -> dataset_client::Result<()> {
        DatasetClient::upload_dataset(self, token, file_path).await
    }
}
