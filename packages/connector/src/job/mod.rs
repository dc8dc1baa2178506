//! Export job: analytical engine, worker, and the seams tests mock out.

pub mod engine;
pub mod error;
pub mod testing;
pub mod traits;
pub mod worker;

pub use engine::{boot_statements, DuckDbEngine, SourceDatabaseType, ATTACHED_DATABASE};
pub use error::JobError;
pub use traits::{BaseAnalyticalEngine, BaseDatasetApi};
pub use worker::{
    export_statement, JobWorker, SourceDatabaseConfig, WorkerConfig, PARQUET_CONTENT_TYPE,
};
