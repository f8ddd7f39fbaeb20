//! The `Pgjq` handle: one entry point for every queue operation.

use pgjq_config::{PgjqConfig, WorkerConfig};
use pgjq_core::{
    Clock, Error, Job, JobChartRecord, JobId, JobPage, JobStore, ListJobsRequest, MetricsResult,
    NewJob, QueueName, QueueSummary, Result, SweepReport, SystemClock, TotalMetricsResult,
};
use pgjq_db::{MemoryJobStore, PgJobStore};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    ClaimScheduler, JobHandler, JobLister, JobQueue, MetricsAggregator, QueueRegistry,
    StalenessReaper, Worker,
};

/// A connected queue engine.
///
/// Every call is bounded by the configured call timeout. A call that times out has an
/// unknown outcome: an enqueue may or may not have happened.
pub struct Pgjq {
    store: Arc<dyn JobStore>,
    registry: QueueRegistry,
    jobs: Arc<JobQueue>,
    scheduler: Arc<ClaimScheduler>,
    reaper: StalenessReaper,
    metrics: MetricsAggregator,
    lister: JobLister,
    worker_config: WorkerConfig,
    call_timeout: Duration,
    closed: AtomicBool,
}

impl Pgjq {
    /// Connect to PostgreSQL using `config.database`.
    pub async fn connect(config: &PgjqConfig) -> Result<Self> {
        let url = config.database.url.as_deref().ok_or_else(|| {
            Error::InvalidArgument("database url is not configured".to_string())
        })?;

        let pool = pgjq_db::create_pool(url, &config.database).await?;
        if config.database.run_migrations {
            pgjq_db::run_migrations(&pool).await?;
            info!("Applied database migrations");
        }
        info!(
            max_connections = config.database.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self::with_store(
            Arc::new(PgJobStore::new(pool)),
            Arc::new(SystemClock),
            config,
        ))
    }

    /// An engine over a fresh in-memory store.
    pub fn in_memory(config: &PgjqConfig) -> Self {
        Self::with_store(Arc::new(MemoryJobStore::new()), Arc::new(SystemClock), config)
    }

    pub fn with_store(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, config: &PgjqConfig) -> Self {
        let engine = &config.engine;
        let scheduler = ClaimScheduler::new(store.clone(), clock.clone())
            .with_stale_after(engine.claim_stale_after);

        Self {
            registry: QueueRegistry::new(store.clone(), clock.clone()),
            jobs: Arc::new(JobQueue::new(
                store.clone(),
                clock.clone(),
                engine.default_stale_after,
            )),
            scheduler: Arc::new(scheduler),
            reaper: StalenessReaper::new(store.clone(), clock.clone(), engine.reclaim_policy()),
            metrics: MetricsAggregator::new(store.clone(), clock, config.chart.clone()),
            lister: JobLister::new(store.clone(), engine.max_per_page),
            worker_config: config.worker.clone(),
            call_timeout: engine.call_timeout,
            closed: AtomicBool::new(false),
            store,
        }
    }

    /// Window given to jobs enqueued without one.
    pub fn default_stale_after(&self) -> Duration {
        self.jobs.default_stale_after()
    }

    /// A consumer loop for `queue` sharing this engine's store.
    pub fn worker(&self, queue: &str, handler: Arc<dyn JobHandler>) -> Result<Worker> {
        Ok(Worker::new(
            QueueName::new(queue)?,
            self.scheduler.clone(),
            self.jobs.clone(),
            handler,
            self.worker_config.clone(),
        ))
    }

    async fn call<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Unavailable("engine is shut down".to_string()));
        }
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout = ?self.call_timeout, "Call timed out");
                Err(Error::Timeout(format!(
                    "{} exceeded {:?}",
                    op, self.call_timeout
                )))
            }
        }
    }

    pub async fn create_queue(&self, name: &str) -> Result<()> {
        let queue = QueueName::new(name)?;
        self.call("create_queue", self.registry.create_queue(&queue))
            .await
    }

    pub async fn ensure_queue(&self, name: &str) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("ensure_queue", self.registry.ensure_queue(&queue))
            .await
    }

    pub async fn drop_queue(&self, name: &str) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("drop_queue", self.registry.drop_queue(&queue)).await
    }

    pub async fn queue_exists(&self, name: &str) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("queue_exists", self.registry.queue_exists(&queue))
            .await
    }

    pub async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        self.call("list_queues", self.registry.list_queues()).await
    }

    pub async fn purge_queue(&self, name: &str) -> Result<u64> {
        let queue = QueueName::new(name)?;
        self.call("purge_queue", self.registry.purge_queue(&queue))
            .await
    }

    /// Enqueue a payload. `stale_after` falls back to the configured default.
    pub async fn enqueue(
        &self,
        name: &str,
        payload: Value,
        stale_after: Option<Duration>,
        priority: i32,
    ) -> Result<JobId> {
        let queue = QueueName::new(name)?;
        let stale_after = stale_after.unwrap_or(self.jobs.default_stale_after());
        self.call(
            "enqueue",
            self.jobs.enqueue(&queue, payload, stale_after, priority),
        )
        .await
    }

    pub async fn enqueue_job(&self, name: &str, job: NewJob) -> Result<JobId> {
        let queue = QueueName::new(name)?;
        self.call("enqueue_job", self.jobs.enqueue_job(&queue, job))
            .await
    }

    pub async fn dequeue(&self, name: &str) -> Result<Option<Job>> {
        let queue = QueueName::new(name)?;
        self.call("dequeue", self.scheduler.dequeue(&queue)).await
    }

    pub async fn ack(&self, name: &str, job_id: JobId) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("ack", self.jobs.ack(&queue, job_id)).await
    }

    pub async fn nack(&self, name: &str, job_id: JobId) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("nack", self.jobs.nack(&queue, job_id)).await
    }

    pub async fn cancel(&self, name: &str, job_id: JobId) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("cancel", self.jobs.cancel(&queue, job_id)).await
    }

    pub async fn delete_job(&self, name: &str, job_id: JobId) -> Result<bool> {
        let queue = QueueName::new(name)?;
        self.call("delete_job", self.jobs.delete_job(&queue, job_id))
            .await
    }

    pub async fn get_job(&self, name: &str, job_id: JobId) -> Result<Job> {
        let queue = QueueName::new(name)?;
        self.call("get_job", self.lister.get_job(&queue, job_id)).await
    }

    pub async fn list_jobs(&self, name: &str, request: &ListJobsRequest) -> Result<JobPage> {
        let queue = QueueName::new(name)?;
        self.call("list_jobs", self.lister.list_jobs(&queue, request))
            .await
    }

    pub async fn get_metrics(&self, name: &str) -> Result<MetricsResult> {
        let queue = QueueName::new(name)?;
        self.call("get_metrics", self.metrics.get_metrics(&queue))
            .await
    }

    pub async fn get_all_metrics(&self) -> Result<Vec<MetricsResult>> {
        self.call("get_all_metrics", self.metrics.get_all_metrics())
            .await
    }

    pub async fn get_total_metrics(&self) -> Result<TotalMetricsResult> {
        self.call("get_total_metrics", self.metrics.get_total_metrics())
            .await
    }

    pub async fn get_jobs_chart(&self, name: &str) -> Result<Vec<JobChartRecord>> {
        let queue = QueueName::new(name)?;
        self.call("get_jobs_chart", self.metrics.get_jobs_chart(&queue))
            .await
    }

    pub async fn mark_stale_jobs(&self, name: &str) -> Result<SweepReport> {
        let queue = QueueName::new(name)?;
        self.call("mark_stale_jobs", self.reaper.mark_stale_jobs(&queue))
            .await
    }

    pub async fn mark_all_stale_jobs(&self) -> Result<SweepReport> {
        self.call("mark_all_stale_jobs", self.reaper.mark_all_stale_jobs())
            .await
    }

    /// Check that the store is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.call("ping", self.store.ping()).await
    }

    /// Close the store. Later calls fail with `Unavailable`.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.store.close().await;
        info!(store = self.store.name(), "Engine shut down");
    }
}
