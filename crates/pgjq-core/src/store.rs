//! The job store repository trait.
//!
//! Every engine algorithm (claiming, sweeping, metrics, listing) is written against
//! this trait and receives the store as an injected dependency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    ClaimSpec, Job, JobFilter, JobId, JobPage, JobTimeline, NewJob, OrderBy, QueueName,
    QueueStats, QueueSummary, ReclaimPolicy, Result, SweepReport, Transition,
};

/// Durable per-queue collection of job records.
///
/// Every method fails with `Error::QueueNotFound` when the queue does not exist,
/// except `drop_queue` and `queue_exists`. Time is always passed in by the caller.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Name of this store backend, for logs.
    fn name(&self) -> &'static str;

    /// Create an empty queue. Fails with `Error::AlreadyExists` if it exists.
    async fn create_queue(&self, queue: &QueueName, now: DateTime<Utc>) -> Result<()>;

    /// Delete a queue and all its jobs atomically. Returns whether it existed.
    async fn drop_queue(&self, queue: &QueueName) -> Result<bool>;

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool>;

    /// All queues ordered by name.
    async fn list_queues(&self) -> Result<Vec<QueueSummary>>;

    /// Append a pending job and return its freshly assigned id.
    async fn insert_job(&self, queue: &QueueName, job: NewJob, now: DateTime<Utc>)
    -> Result<JobId>;

    /// Select the best eligible job and mark it active in one indivisible step.
    ///
    /// Rows locked by a concurrent claimant are skipped, never waited on.
    async fn claim(&self, queue: &QueueName, spec: &ClaimSpec) -> Result<Option<Job>>;

    /// Compare-and-set the status of one job. Returns whether it applied.
    async fn transition(
        &self,
        queue: &QueueName,
        job_id: JobId,
        transition: &Transition,
    ) -> Result<bool>;

    /// Requeue or stale every expired active job not locked by someone else.
    async fn reclaim_expired(
        &self,
        queue: &QueueName,
        now: DateTime<Utc>,
        policy: &ReclaimPolicy,
    ) -> Result<SweepReport>;

    async fn delete_job(&self, queue: &QueueName, job_id: JobId) -> Result<bool>;

    /// Delete every job of the queue. Returns how many were removed.
    async fn purge(&self, queue: &QueueName) -> Result<u64>;

    async fn get_job(&self, queue: &QueueName, job_id: JobId) -> Result<Option<Job>>;

    /// Jobs matching `filter` in `order`, sliced by `offset` and `limit`, together with the
    /// number of matches on any page. Both are read from one snapshot of the queue.
    async fn find_page(
        &self,
        queue: &QueueName,
        filter: &JobFilter,
        order: &[OrderBy],
        offset: u64,
        limit: u64,
    ) -> Result<JobPage>;

    /// Per-status aggregates as of `now`.
    async fn queue_stats(&self, queue: &QueueName, now: DateTime<Utc>) -> Result<QueueStats>;

    /// Lifecycle timestamps of every job in the queue.
    async fn timelines(&self, queue: &QueueName) -> Result<Vec<JobTimeline>>;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Release resources. Later calls fail with `Error::Unavailable`.
    async fn close(&self);
}
