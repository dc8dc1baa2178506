//! DuckDB-backed analytical engine.
//!
//! DuckDB runs in-process with an in-memory catalog; the source database is
//! attached through the `postgres` / `mysql` extension and queried from there.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use duckdb::Connection;

use super::traits::BaseAnalyticalEngine;
use super::worker::SourceDatabaseConfig;
use super::JobError;

/// Logical name the source database is mounted under.
pub const ATTACHED_DATABASE: &str = "db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDatabaseType {
    Postgres,
    Mysql,
}

impl SourceDatabaseType {
    /// DuckDB extension (and ATTACH type) name.
    pub fn extension(&self) -> &'static str {
        match self {
            SourceDatabaseType::Postgres => "postgres",
            SourceDatabaseType::Mysql => "mysql",
        }
    }
}

impl fmt::Display for SourceDatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SourceDatabaseType {
    type Err = JobError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(SourceDatabaseType::Postgres),
            "mysql" => Ok(SourceDatabaseType::Mysql),
            other => Err(JobError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// Statements that install the driver and attach the source database read-only.
pub fn boot_statements(db_type: SourceDatabaseType, source: &SourceDatabaseConfig) -> Vec<String> {
    let dsn = format!(
        "dbname={} user={} host={} port={} password={}",
        source.name, source.user, source.host, source.port, source.password
    );

    vec![
        format!("INSTALL {};", db_type),
        format!("LOAD {};", db_type),
        format!(
            "ATTACH '{}' AS {} (TYPE {}, READ_ONLY)",
            dsn, ATTACHED_DATABASE, db_type
        ),
    ]
}

/// In-memory DuckDB connection.
///
/// Statements run on the blocking pool; the connection sits behind a mutex so
/// the handle can be moved into `spawn_blocking`.
pub struct DuckDbEngine {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbEngine {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open DuckDB")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl BaseAnalyticalEngine for DuckDbEngine {
    async fn execute(&self, sql: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn
                .lock()
                .map_err(|_| anyhow!("DuckDB connection mutex poisoned"))?;
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
        .context("DuckDB statement task failed")?
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mutex = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("DuckDB connection still in use by a running statement"))?;
        let conn = mutex
            .into_inner()
            .map_err(|_| anyhow!("DuckDB connection mutex poisoned"))?;

        conn.close().map_err(|(_, e)| anyhow::Error::from(e))
    }
}
