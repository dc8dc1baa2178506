// Main entry point for the connector service

use std::sync::Arc;

use anyhow::{Context, Result};
use connector_core::health::serve_health;
use connector_core::job::BaseDatasetApi;
use connector_core::logging::init_logging;
use connector_core::retry::RetryPolicy;
use connector_core::scheduler::{
    start_scheduler, stop_scheduler, DuckDbWorkerFactory, ExportJob, ScheduleRegistry,
};
use connector_core::Config;
use dataset_client::DatasetClient;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (missing settings are fatal)
    let config = Config::from_env().context("Failed to read config")?;

    init_logging(&config.log_level, &config.log_format);
    tracing::info!("Starting Polyteia DB connector");

    let client: Arc<dyn BaseDatasetApi> = Arc::new(DatasetClient::new(
        config.personal_access_token.clone(),
        config.base_url.clone(),
    ));
    let factory = Arc::new(DuckDbWorkerFactory::new(client, config.worker_config()));
    let job = Arc::new(ExportJob::new(factory, RetryPolicy::job()));

    let cancel = CancellationToken::new();
    let registry = ScheduleRegistry::new();

    let scheduler = start_scheduler(
        job,
        &config.cron_schedule,
        registry.clone(),
        cancel.clone(),
    )
    .await
    .context("Error creating cron job")?;

    let health_port = config.health_check_port;
    let health_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_health(health_port, health_registry).await {
            tracing::error!(error = %e, "Error starting health check server");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    cancel.cancel();
    stop_scheduler(scheduler, &registry)
        .await
        .context("Failed to stop scheduler")?;

    Ok(())
}
