//! Consumer-side claiming.

use pgjq_core::{ClaimSpec, Clock, Job, JobStore, QueueName, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Hands out the single best eligible job per call.
///
/// Eligible means pending, or active with an expired window that the reaper has not
/// swept yet. Order is priority first, then enqueue time, then job id.
pub struct ClaimScheduler {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    stale_after: Option<Duration>,
}

impl ClaimScheduler {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            stale_after: None,
        }
    }

    /// Replace each claimed job's window with `stale_after`.
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Claim the next job, or `None` when nothing is eligible.
    pub async fn dequeue(&self, queue: &QueueName) -> Result<Option<Job>> {
        let spec = ClaimSpec::new(self.clock.now()).with_stale_after(self.stale_after);
        let job = self.store.claim(queue, &spec).await?;
        if let Some(job) = &job {
            debug!(queue = %queue, job_id = %job.job_id, read_ct = job.read_ct, "Claimed job");
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobQueue, StalenessReaper, testing};
    use pgjq_core::{JobId, JobStatus, ReclaimPolicy};
    use serde_json::json;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_priority_ordering() {
        let (store, queue) = testing::store_with_queue("work").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        let scheduler = ClaimScheduler::new(store, clock);

        let _a = jobs.enqueue(&queue, json!("a"), Duration::from_secs(60), 0).await.unwrap();
        let b = jobs.enqueue(&queue, json!("b"), Duration::from_secs(60), 5).await.unwrap();

        assert_eq!(scheduler.dequeue(&queue).await.unwrap().unwrap().job_id, b);
    }

    #[tokio::test]
    async fn test_fifo_tie_break() {
        let (store, queue) = testing::store_with_queue("work").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        let scheduler = ClaimScheduler::new(store, clock);

        let a = jobs.enqueue(&queue, json!("a"), Duration::from_secs(60), 0).await.unwrap();
        let b = jobs.enqueue(&queue, json!("b"), Duration::from_secs(60), 0).await.unwrap();

        assert_eq!(scheduler.dequeue(&queue).await.unwrap().unwrap().job_id, a);
        assert_eq!(scheduler.dequeue(&queue).await.unwrap().unwrap().job_id, b);
        assert!(scheduler.dequeue(&queue).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_sets_active_fields() {
        let (store, queue) = testing::store_with_queue("work").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        let scheduler = ClaimScheduler::new(store, clock.clone());

        jobs.enqueue(&queue, json!({}), Duration::from_secs(60), 0).await.unwrap();
        clock.advance(Duration::from_secs(3));

        let job = scheduler.dequeue(&queue).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.read_ct, 1);
        assert_eq!(job.dequeued_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_stale_after_override() {
        let (store, queue) = testing::store_with_queue("work").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        let scheduler =
            ClaimScheduler::new(store, clock).with_stale_after(Some(Duration::from_secs(5)));

        jobs.enqueue(&queue, json!({}), Duration::from_secs(60), 0).await.unwrap();
        let job = scheduler.dequeue(&queue).await.unwrap().unwrap();
        assert_eq!(job.stale_after, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_staleness_round_trip() {
        let (store, queue) = testing::store_with_queue("work").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        let scheduler = ClaimScheduler::new(store.clone(), clock.clone());
        let reaper = StalenessReaper::new(store, clock.clone(), ReclaimPolicy::requeue_always());

        let id = jobs.enqueue(&queue, json!({}), Duration::from_secs(1), 0).await.unwrap();
        let first = scheduler.dequeue(&queue).await.unwrap().unwrap();
        assert_eq!((first.job_id, first.read_ct), (id, 1));
        assert!(scheduler.dequeue(&queue).await.unwrap().is_none());

        clock.advance(Duration::from_millis(1_100));
        let report = reaper.mark_stale_jobs(&queue).await.unwrap();
        assert_eq!(report.requeued, vec![id]);

        let again = scheduler.dequeue(&queue).await.unwrap().unwrap();
        assert_eq!((again.job_id, again.read_ct), (id, 2));
    }

    #[tokio::test]
    async fn test_missing_queue() {
        let (store, _) = testing::store_with_queue("work").await;
        let scheduler = ClaimScheduler::new(store, testing::clock());
        let err = scheduler
            .dequeue(&QueueName::new("other").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, pgjq_core::Error::QueueNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_double_delivery() {
        let (store, queue) = testing::store_with_queue("work").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        for i in 0..64 {
            jobs.enqueue(&queue, json!(i), Duration::from_secs(60), i % 3).await.unwrap();
        }

        let scheduler = Arc::new(ClaimScheduler::new(store, clock));
        let mut handles = Vec::new();
        for _ in 0..48 {
            let scheduler = scheduler.clone();
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { scheduler.dequeue(&queue).await }));
        }

        let mut seen: HashSet<JobId> = HashSet::new();
        for handle in handles {
            let job = handle.await.unwrap().unwrap().expect("enough eligible jobs");
            assert!(seen.insert(job.job_id), "job {} delivered twice", job.job_id);
        }
        assert_eq!(seen.len(), 48);
    }
}
