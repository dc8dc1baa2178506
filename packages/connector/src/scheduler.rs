//! Scheduled export using tokio-cron-scheduler.
//!
//! Each firing runs one export job end to end:
//!
//! ```text
//! Scheduler (cron)
//!     │
//!     └─► ExportJob::fire()
//!             ├─► create worker (attach source database)
//!             ├─► do_with_retry(worker.run)
//!             └─► worker.close()   (always, errors logged)
//! ```
//!
//! Firings never overlap: if the previous job is still running (for example
//! sleeping between retries) the new firing is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::job::{BaseDatasetApi, JobError, JobWorker, WorkerConfig};
use crate::retry::{do_with_retry, RetryPolicy};

/// Creates a fresh, fully booted worker for each firing.
#[async_trait]
pub trait BaseWorkerFactory: Send + Sync {
    async fn create(&self, cancel: &CancellationToken) -> std::result::Result<JobWorker, JobError>;
}

/// Builds workers on an in-memory DuckDB engine.
pub struct DuckDbWorkerFactory {
    api: Arc<dyn BaseDatasetApi>,
    config: WorkerConfig,
}

impl DuckDbWorkerFactory {
    pub fn new(api: Arc<dyn BaseDatasetApi>, config: WorkerConfig) -> Self {
        Self { api, config }
    }
}

#[async_trait]
impl BaseWorkerFactory for DuckDbWorkerFactory {
    async fn create(&self, cancel: &CancellationToken) -> std::result::Result<JobWorker, JobError> {
        JobWorker::connect(self.api.clone(), self.config.clone(), cancel).await
    }
}

/// How a single firing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    Succeeded,
    /// All retry attempts failed
    Failed,
    /// Worker could not be built; nothing was retried
    ConstructionFailed,
    /// A previous firing was still in flight
    Skipped,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The trigger body: create worker → retry(run) → close.
pub struct ExportJob {
    factory: Arc<dyn BaseWorkerFactory>,
    policy: RetryPolicy,
    in_flight: AtomicBool,
}

impl ExportJob {
    pub fn new(factory: Arc<dyn BaseWorkerFactory>, policy: RetryPolicy) -> Self {
        Self {
            factory,
            policy,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn fire(&self, cancel: &CancellationToken) -> FiringOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Previous job still running, skipping this firing");
            return FiringOutcome::Skipped;
        };

        info!("Starting worker...");
        let worker = match self.factory.create(cancel).await {
            Ok(worker) => worker,
            Err(e) => {
                error!(error = %e, "Error creating new worker");
                return FiringOutcome::ConstructionFailed;
            }
        };

        let span = info_span!("job", job_id = %worker.id());
        let worker_ref = &worker;
        let result = do_with_retry(&self.policy, move || worker_ref.run(cancel))
            .instrument(span.clone())
            .await;

        let outcome = match result {
            Ok(()) => FiringOutcome::Succeeded,
            Err(e) => {
                error!(parent: &span, error = %e, "Failed to run job after all retries");
                FiringOutcome::Failed
            }
        };

        if let Err(e) = worker.close() {
            error!(parent: &span, error = %e, "Failed to close worker");
        }

        outcome
    }
}

/// Ids of jobs registered with the scheduler, read by the health probe.
#[derive(Clone, Default)]
pub struct ScheduleRegistry {
    job_ids: Arc<RwLock<Vec<Uuid>>>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job_id: Uuid) {
        if let Ok(mut ids) = self.job_ids.write() {
            ids.push(job_id);
        }
    }

    pub fn job_count(&self) -> usize {
        self.job_ids.read().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut ids) = self.job_ids.write() {
            ids.clear();
        }
    }
}

/// Accept standard 5-field cron expressions by prepending a seconds field.
pub fn normalize_cron(expression: &str) -> String {
    let expression = expression.trim();
    if expression.split_whitespace().count() == 5 {
        format!("0 {}", expression)
    } else {
        expression.to_string()
    }
}

/// Register `job` on `cron_expression` and start the scheduler.
pub async fn start_scheduler(
    job: Arc<ExportJob>,
    cron_expression: &str,
    registry: ScheduleRegistry,
    cancel: CancellationToken,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let schedule = normalize_cron(cron_expression);

    // Evaluated in the host's local time zone
    let cron_job = Job::new_async_tz(schedule.as_str(), chrono::Local, move |_uuid, _lock| {
        let job = job.clone();
        let cancel = cancel.clone();
        Box::pin(async move {
            let outcome = job.fire(&cancel).await;
            info!(?outcome, "Scheduled export finished");
        })
    })?;

    let job_id = scheduler.add(cron_job).await?;
    registry.register(job_id);
    scheduler.start().await?;

    info!(schedule = %schedule, "Starting cron scheduler");
    Ok(scheduler)
}

/// Deregister every job, then stop the scheduler.
pub async fn stop_scheduler(mut scheduler: JobScheduler, registry: &ScheduleRegistry) -> Result<()> {
    registry.clear();
    scheduler.shutdown().await?;
    info!("Cron scheduler stopped");
    Ok(())
}
