//! Worker that processes jobs from a queue.

use async_trait::async_trait;
use pgjq_config::WorkerConfig;
use pgjq_core::{Job, JobId, QueueName, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{ClaimScheduler, JobQueue};

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Application code run for each claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// `Ok` acks the job, `Err` nacks it.
    async fn handle(&self, job: &Job) -> std::result::Result<(), HandlerError>;
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    Completed(JobId),
    Failed(JobId),
    /// The claim was lost before settling, e.g. the job was reaped or cancelled.
    Abandoned(JobId),
}

/// A worker that claims and handles jobs.
pub struct Worker {
    id: String,
    queue: QueueName,
    scheduler: Arc<ClaimScheduler>,
    jobs: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        queue: QueueName,
        scheduler: Arc<ClaimScheduler>,
        jobs: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            queue,
            scheduler,
            jobs,
            handler,
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Claim at most one job and settle it.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let Some(job) = self.scheduler.dequeue(&self.queue).await? else {
            return Ok(PollOutcome::Idle);
        };
        info!(worker_id = %self.id, queue = %self.queue, job_id = %job.job_id, read_ct = job.read_ct, "Claimed job");

        match self.handler.handle(&job).await {
            Ok(()) => {
                if self.jobs.ack(&self.queue, job.job_id).await? {
                    Ok(PollOutcome::Completed(job.job_id))
                } else {
                    warn!(worker_id = %self.id, job_id = %job.job_id, "Job no longer active, ack dropped");
                    Ok(PollOutcome::Abandoned(job.job_id))
                }
            }
            Err(e) => {
                warn!(worker_id = %self.id, job_id = %job.job_id, error = %e, "Job handler failed");
                if self.jobs.nack(&self.queue, job.job_id).await? {
                    Ok(PollOutcome::Failed(job.job_id))
                } else {
                    Ok(PollOutcome::Abandoned(job.job_id))
                }
            }
        }
    }

    /// Run the worker loop until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.id, queue = %self.queue, "Starting worker");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
            let pause = match self.poll_once().await {
                Ok(PollOutcome::Idle) => self.config.poll_interval,
                Ok(_) => continue,
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "Failed to claim job");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker_id = %self.id, "Worker stopped");
    }
}
