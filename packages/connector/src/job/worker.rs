//! Single-use export worker.
//!
//! A `JobWorker` owns one analytical-engine connection with the source
//! database attached. Each instance performs one export-and-upload cycle:
//!
//! ```text
//! JobWorker::run
//!     │
//!     ├─► COPY (<query>) TO '<tmp>.parquet' (FORMAT PARQUET)
//!     ├─► generate_dataset_upload_token(dataset_id, parquet)
//!     └─► upload_dataset(token, <tmp>.parquet)
//! ```
//!
//! The query text is embedded verbatim into the COPY statement. It is trusted
//! configuration; the source credentials bound what it can reach, and the
//! source database is attached read-only.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use dataset_client::DatasetUploadTokenRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::{boot_statements, DuckDbEngine, SourceDatabaseType};
use super::error::{JobError, Result};
use super::traits::{BaseAnalyticalEngine, BaseDatasetApi};

/// Content type declared when requesting an upload token.
pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

#[derive(Debug, Clone)]
pub struct SourceDatabaseConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub db_type: String,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub dataset_id: String,
    pub sql_query: String,
    pub source_database: SourceDatabaseConfig,
}

/// Build the statement that exports the query result to `path` as Parquet.
pub fn export_statement(sql_query: &str, path: &Path) -> String {
    format!(
        "COPY ({}) TO '{}' (FORMAT PARQUET);",
        sql_query,
        path.display().to_string().replace('\'', "''")
    )
}

pub struct JobWorker {
    id: String,
    api: Arc<dyn BaseDatasetApi>,
    engine: Box<dyn BaseAnalyticalEngine>,
    config: WorkerConfig,
}

impl JobWorker {
    /// Open a fresh in-memory DuckDB engine and attach the source database.
    pub async fn connect(
        api: Arc<dyn BaseDatasetApi>,
        config: WorkerConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        // Reject unsupported types before opening anything.
        config.source_database.db_type.parse::<SourceDatabaseType>()?;

        let engine = DuckDbEngine::open_in_memory().map_err(JobError::Engine)?;
        Self::new(api, Box::new(engine), config, cancel).await
    }

    /// Boot `engine` against the configured source database.
    ///
    /// On any failure, cancellation included, the engine is closed and no
    /// worker is returned.
    pub async fn new(
        api: Arc<dyn BaseDatasetApi>,
        engine: Box<dyn BaseAnalyticalEngine>,
        config: WorkerConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let db_type = match config.source_database.db_type.parse::<SourceDatabaseType>() {
            Ok(db_type) => db_type,
            Err(e) => {
                release(engine);
                return Err(e);
            }
        };

        for statement in boot_statements(db_type, &config.source_database) {
            let booted = cancellable(cancel, async {
                engine.execute(&statement).await.map_err(JobError::Engine)
            })
            .await;
            if let Err(e) = booted {
                release(engine);
                return Err(e);
            }
        }

        Ok(Self {
            id: Utc::now().timestamp().to_string(),
            api,
            engine,
            config,
        })
    }

    /// Time-derived identifier, used for log correlation only.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Export the query result and upload it to the configured dataset.
    ///
    /// Returns the first error encountered, unchanged. Steps abort with
    /// `JobError::Cancelled` once `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Running job worker");

        let temp_file = tempfile::Builder::new().suffix(".parquet").tempfile()?;
        let path = temp_file.path();

        info!(file = %path.display(), "Executing query and saving results");
        let statement = export_statement(&self.config.sql_query, path);
        cancellable(cancel, async {
            self.engine.execute(&statement).await.map_err(JobError::Engine)
        })
        .await?;

        debug!("Generating dataset upload token");
        let request = DatasetUploadTokenRequest {
            id: self.config.dataset_id.clone(),
            content_type: PARQUET_CONTENT_TYPE.to_string(),
        };
        let upload_token = cancellable(cancel, async {
            self.api
                .generate_upload_token(request)
                .await
                .map_err(JobError::from)
        })
        .await?;

        info!(
            dataset_id = %self.config.dataset_id,
            file = %path.display(),
            "Uploading file to dataset"
        );
        cancellable(cancel, async {
            self.api
                .upload_dataset(&upload_token.token, path)
                .await
                .map_err(JobError::from)
        })
        .await?;

        info!("Job finished successfully");
        Ok(())
    }

    /// Release the engine connection.
    pub fn close(self) -> anyhow::Result<()> {
        self.engine.close()
    }
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        result = fut => result,
    }
}

fn release(engine: Box<dyn BaseAnalyticalEngine>) {
    if let Err(e) = engine.close() {
        warn!(error = %e, "Failed to close engine after boot failure");
    }
}
