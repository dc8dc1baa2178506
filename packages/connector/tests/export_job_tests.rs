//! Trigger sequencing: create worker → retry(run) → close.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use connector_core::job::testing::{EngineProbe, MockDatasetApi, MockEngine};
use connector_core::job::{JobError, JobWorker, SourceDatabaseConfig, WorkerConfig};
use connector_core::retry::RetryPolicy;
use connector_core::scheduler::{BaseWorkerFactory, ExportJob, FiringOutcome};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(60);

fn worker_config(db_type: &str) -> WorkerConfig {
    WorkerConfig {
        dataset_id: "ds_7".into(),
        sql_query: "SELECT 1 AS x".into(),
        source_database: SourceDatabaseConfig {
            host: "localhost".into(),
            port: "3306".into(),
            user: "reader".into(),
            password: String::new(),
            name: "shop".into(),
            db_type: db_type.into(),
        },
    }
}

/// Builds workers on mock engines and remembers each engine's probe.
struct MockWorkerFactory {
    api: Arc<MockDatasetApi>,
    db_type: String,
    fail_copy: bool,
    block_attach: bool,
    created: AtomicUsize,
    probes: Mutex<Vec<EngineProbe>>,
}

impl MockWorkerFactory {
    fn new(api: Arc<MockDatasetApi>) -> Self {
        Self {
            api,
            db_type: "mysql".into(),
            fail_copy: false,
            block_attach: false,
            created: AtomicUsize::new(0),
            probes: Mutex::new(Vec::new()),
        }
    }

    fn failing_copy(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    fn blocking_attach(mut self) -> Self {
        self.block_attach = true;
        self
    }

    fn with_db_type(mut self, db_type: &str) -> Self {
        self.db_type = db_type.into();
        self
    }

    fn probes(&self) -> Vec<EngineProbe> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseWorkerFactory for MockWorkerFactory {
    async fn create(&self, cancel: &CancellationToken) -> Result<JobWorker, JobError> {
        self.created.fetch_add(1, Ordering::SeqCst);

        let mut engine = MockEngine::new().writing_output();
        if self.fail_copy {
            engine = engine.failing_on("COPY");
        }
        if self.block_attach {
            engine = engine.blocking_on("ATTACH");
        }
        self.probes.lock().unwrap().push(engine.probe());

        JobWorker::new(
            self.api.clone(),
            Box::new(engine),
            worker_config(&self.db_type),
            cancel,
        )
        .await
    }
}

#[tokio::test(start_paused = true)]
async fn successful_firing_closes_worker() {
    let api = Arc::new(MockDatasetApi::new());
    let factory = Arc::new(MockWorkerFactory::new(api.clone()));
    let job = ExportJob::new(factory.clone(), RetryPolicy::new(3, INTERVAL));

    let outcome = job.fire(&CancellationToken::new()).await;

    assert_eq!(outcome, FiringOutcome::Succeeded);
    assert_eq!(api.uploads(), 1);
    assert!(factory.probes()[0].is_closed());
    assert!(!job.is_running());
}

#[tokio::test(start_paused = true)]
async fn transient_upload_failures_are_retried_on_same_worker() {
    let api = Arc::new(MockDatasetApi::new().with_upload_failures(2));
    let factory = Arc::new(MockWorkerFactory::new(api.clone()));
    let job = ExportJob::new(factory.clone(), RetryPolicy::new(3, INTERVAL));
    let start = Instant::now();

    let outcome = job.fire(&CancellationToken::new()).await;

    assert_eq!(outcome, FiringOutcome::Succeeded);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    // A fresh token per attempt
    assert_eq!(api.token_requests(), 3);
    assert_eq!(api.uploads(), 3);
    assert!(start.elapsed() >= INTERVAL * 2 && start.elapsed() < INTERVAL * 3);
    assert!(factory.probes()[0].is_closed());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_still_close_worker() {
    let api = Arc::new(MockDatasetApi::new());
    let factory = Arc::new(MockWorkerFactory::new(api.clone()).failing_copy());
    let job = ExportJob::new(factory.clone(), RetryPolicy::new(3, INTERVAL));

    let outcome = job.fire(&CancellationToken::new()).await;

    assert_eq!(outcome, FiringOutcome::Failed);
    let probes = factory.probes();
    let probe = &probes[0];
    let copies = probe
        .statements()
        .iter()
        .filter(|s| s.starts_with("COPY"))
        .count();
    assert_eq!(copies, 3);
    assert_eq!(api.token_requests(), 0);
    assert!(probe.is_closed());
}

#[tokio::test]
async fn construction_failure_skips_the_firing() {
    let api = Arc::new(MockDatasetApi::new());
    let factory = Arc::new(MockWorkerFactory::new(api.clone()).with_db_type("oracle"));
    let job = ExportJob::new(factory.clone(), RetryPolicy::new(3, INTERVAL));

    let outcome = job.fire(&CancellationToken::new()).await;

    assert_eq!(outcome, FiringOutcome::ConstructionFailed);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    assert!(api.calls().is_empty());
    assert!(!job.is_running());
}

#[tokio::test(start_paused = true)]
async fn overlapping_firing_is_skipped() {
    let api = Arc::new(MockDatasetApi::new().with_upload_failures(1));
    let factory = Arc::new(MockWorkerFactory::new(api.clone()));
    let job = Arc::new(ExportJob::new(factory.clone(), RetryPolicy::new(3, INTERVAL)));
    let cancel = CancellationToken::new();

    // First firing fails once and sleeps before retrying
    let running = {
        let job = job.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { job.fire(&cancel).await })
    };
    while !job.is_running() || api.uploads() == 0 {
        tokio::task::yield_now().await;
    }

    let second = job.fire(&cancel).await;
    assert_eq!(second, FiringOutcome::Skipped);

    assert_eq!(running.await.unwrap(), FiringOutcome::Succeeded);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    assert!(!job.is_running());
}

#[tokio::test]
async fn cancellation_during_construction_ends_the_firing() {
    let api = Arc::new(MockDatasetApi::new());
    let factory = Arc::new(MockWorkerFactory::new(api.clone()).blocking_attach());
    let job = ExportJob::new(factory.clone(), RetryPolicy::new(3, INTERVAL));
    let cancel = CancellationToken::new();

    let probes = factory.clone();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        while !probes
            .probes()
            .iter()
            .any(|p| p.statements().iter().any(|s| s.starts_with("ATTACH")))
        {
            tokio::task::yield_now().await;
        }
        canceller.cancel();
    });

    let outcome = job.fire(&cancel).await;

    assert_eq!(outcome, FiringOutcome::ConstructionFailed);
    assert!(factory.probes()[0].is_closed());
    assert!(api.calls().is_empty());
    assert!(!job.is_running());
}
