// Mock implementations for testing the job worker
//
// Both mocks record every call so tests can assert on ordering and on which
// steps never ran.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dataset_client::{
    ApiError, DatasetUploadTokenRequest, DatasetUploadTokenResponse, RemoteFault,
};

use super::traits::{BaseAnalyticalEngine, BaseDatasetApi};

// =============================================================================
// Mock Analytical Engine
// =============================================================================

/// Handle kept by the test after the engine is moved into a worker.
#[derive(Clone, Default)]
pub struct EngineProbe {
    statements: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl EngineProbe {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockEngine {
    probe: EngineProbe,
    fail_prefixes: Vec<String>,
    block_prefixes: Vec<String>,
    write_output: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            probe: EngineProbe::default(),
            fail_prefixes: Vec::new(),
            block_prefixes: Vec::new(),
            write_output: false,
        }
    }

    /// Fail any statement starting with `prefix`
    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.fail_prefixes.push(prefix.to_string());
        self
    }

    /// Never complete any statement starting with `prefix`
    pub fn blocking_on(mut self, prefix: &str) -> Self {
        self.block_prefixes.push(prefix.to_string());
        self
    }

    /// Write placeholder bytes to the target of `COPY ... TO '<path>'`
    pub fn writing_output(mut self) -> Self {
        self.write_output = true;
        self
    }

    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAnalyticalEngine for MockEngine {
    async fn execute(&self, sql: &str) -> Result<()> {
        self.probe.statements.lock().unwrap().push(sql.to_string());

        if self.fail_prefixes.iter().any(|p| sql.starts_with(p.as_str())) {
            return Err(anyhow!("mock engine failure: {}", sql));
        }

        if self.block_prefixes.iter().any(|p| sql.starts_with(p.as_str())) {
            std::future::pending::<()>().await;
        }

        if self.write_output && sql.starts_with("COPY") {
            if let Some(path) = copy_target(sql) {
                std::fs::write(path, b"PAR1mock")?;
            }
        }

        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn copy_target(sql: &str) -> Option<&str> {
    let start = sql.find(") TO '")? + ") TO '".len();
    let end = start + sql[start..].find("' (FORMAT")?;
    Some(&sql[start..end])
}

// =============================================================================
// Mock Dataset API
// =============================================================================

/// A recorded dataset API call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    GenerateToken { dataset_id: String, content_type: String },
    Upload { token: String, file_path: PathBuf },
}

pub struct MockDatasetApi {
    calls: Arc<Mutex<Vec<ApiCall>>>,
    token_failures: Mutex<u32>,
    upload_failures: Mutex<u32>,
    issued: Mutex<u32>,
}

impl MockDatasetApi {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            token_failures: Mutex::new(0),
            upload_failures: Mutex::new(0),
            issued: Mutex::new(0),
        }
    }

    /// Fail the next `n` token requests with a remote fault
    pub fn with_token_failures(self, n: u32) -> Self {
        *self.token_failures.lock().unwrap() = n;
        self
    }

    /// Reject the next `n` uploads
    pub fn with_upload_failures(self, n: u32) -> Self {
        *self.upload_failures.lock().unwrap() = n;
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn token_requests(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::GenerateToken { .. }))
            .count()
    }

    pub fn uploads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Upload { .. }))
            .count()
    }
}

impl Default for MockDatasetApi {
    fn default() -> Self {
        Self::new()
    }
}

fn take_failure(counter: &Mutex<u32>) -> bool {
    let mut remaining = counter.lock().unwrap();
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl BaseDatasetApi for MockDatasetApi {
    async fn generate_upload_token(
        &self,
        request: DatasetUploadTokenRequest,
    ) -> dataset_client::Result<DatasetUploadTokenResponse> {
        self.calls.lock().unwrap().push(ApiCall::GenerateToken {
            dataset_id: request.id,
            content_type: request.content_type,
        });

        if take_failure(&self.token_failures) {
            return Err(ApiError::Remote(RemoteFault {
                code: 503,
                message: "token service unavailable".into(),
                details: Vec::new(),
            }));
        }

        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        Ok(DatasetUploadTokenResponse {
            token: format!("upl_{}", *issued),
        })
    }

    async fn upload_dataset(&self, token: &str, file_path: &Path) -> dataset_client::Result<()> {
        self.calls.lock().unwrap().push(ApiCall::Upload {
            token: token.to_string(),
            file_path: file_path.to_path_buf(),
        });

        // Mirrors the real client: the file must be readable before any request.
        std::fs::metadata(file_path)?;

        if take_failure(&self.upload_failures) {
            return Err(ApiError::Upload {
                status: 500,
                body: "storage unavailable".into(),
            });
        }

        Ok(())
    }
}
