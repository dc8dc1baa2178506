// Polyteia DB Connector - Core
//
// Periodically exports the result of a SQL query against an external
// Postgres/MySQL database to Parquet (through an in-process DuckDB engine)
// and uploads it to a Polyteia dataset.

pub mod config;
pub mod health;
pub mod job;
pub mod logging;
pub mod retry;
pub mod scheduler;

pub use config::*;
