//! Producer and acknowledgement operations.

use pgjq_core::{Clock, Job, JobId, JobStore, NewJob, QueueName, Result, Transition};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Enqueues jobs and settles claimed ones.
///
/// `ack`, `nack` and `cancel` are compare-and-set: a missing job or one in the wrong
/// status yields `false` and changes nothing.
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    default_stale_after: Duration,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, default_stale_after: Duration) -> Self {
        Self {
            store,
            clock,
            default_stale_after,
        }
    }

    pub fn default_stale_after(&self) -> Duration {
        self.default_stale_after
    }

    /// Enqueue a job as pending.
    pub async fn enqueue(
        &self,
        queue: &QueueName,
        payload: Value,
        stale_after: Duration,
        priority: i32,
    ) -> Result<JobId> {
        self.enqueue_job(queue, NewJob::new(payload, stale_after).with_priority(priority))
            .await
    }

    /// Enqueue with the configured window and priority 0.
    pub async fn enqueue_with_defaults(&self, queue: &QueueName, payload: Value) -> Result<JobId> {
        self.enqueue(queue, payload, self.default_stale_after, 0).await
    }

    /// Enqueue a fully described job, headers included.
    pub async fn enqueue_job(&self, queue: &QueueName, job: NewJob) -> Result<JobId> {
        let job = job.validated()?;
        let priority = job.priority;
        let job_id = self.store.insert_job(queue, job, self.clock.now()).await?;
        debug!(queue = %queue, job_id = %job_id, priority, "Enqueued job");
        Ok(job_id)
    }

    /// Mark an active job completed.
    pub async fn ack(&self, queue: &QueueName, job_id: JobId) -> Result<bool> {
        self.settle(queue, job_id, Transition::ack(self.clock.now()))
            .await
    }

    /// Mark an active job failed. Failed jobs are never redelivered.
    pub async fn nack(&self, queue: &QueueName, job_id: JobId) -> Result<bool> {
        self.settle(queue, job_id, Transition::nack(self.clock.now()))
            .await
    }

    /// Cancel a job that has not finished yet.
    pub async fn cancel(&self, queue: &QueueName, job_id: JobId) -> Result<bool> {
        self.settle(queue, job_id, Transition::cancel(self.clock.now()))
            .await
    }

    async fn settle(&self, queue: &QueueName, job_id: JobId, transition: Transition) -> Result<bool> {
        let applied = self.store.transition(queue, job_id, &transition).await?;
        if applied {
            debug!(queue = %queue, job_id = %job_id, status = %transition.to, "Settled job");
        } else {
            debug!(queue = %queue, job_id = %job_id, status = %transition.to, "Job not in a settleable state");
        }
        Ok(applied)
    }

    /// Remove a job regardless of its status.
    pub async fn delete_job(&self, queue: &QueueName, job_id: JobId) -> Result<bool> {
        let deleted = self.store.delete_job(queue, job_id).await?;
        if deleted {
            info!(queue = %queue, job_id = %job_id, "Deleted job");
        }
        Ok(deleted)
    }

    pub async fn get_job(&self, queue: &QueueName, job_id: JobId) -> Result<Option<Job>> {
        self.store.get_job(queue, job_id).await
    }
}
