//! Staleness sweep: returns abandoned claims to the queue.

use pgjq_core::{Clock, Error, JobStore, QueueName, ReclaimPolicy, Result, SweepReport};
use std::sync::Arc;
use tracing::{debug, info};

/// Reclaims active jobs whose visibility window ran out.
///
/// Below the policy's `max_reads` an expired job goes back to pending; at or above it the
/// job becomes `stale`. The reaper does not schedule itself.
pub struct StalenessReaper {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: ReclaimPolicy,
}

impl StalenessReaper {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, policy: ReclaimPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Sweep one queue.
    pub async fn mark_stale_jobs(&self, queue: &QueueName) -> Result<SweepReport> {
        let report = self
            .store
            .reclaim_expired(queue, self.clock.now(), &self.policy)
            .await?;
        if !report.is_empty() {
            info!(
                queue = %queue,
                requeued = report.requeued.len(),
                staled = report.staled.len(),
                "Reclaimed expired jobs"
            );
        }
        Ok(report)
    }

    /// Sweep every queue. Queues dropped mid-sweep are skipped.
    pub async fn mark_all_stale_jobs(&self) -> Result<SweepReport> {
        let mut total = SweepReport::default();
        for summary in self.store.list_queues().await? {
            let queue = QueueName::new(summary.name)?;
            match self.mark_stale_jobs(&queue).await {
                Ok(report) => total.merge(report),
                Err(Error::QueueNotFound(_)) => {
                    debug!(queue = %queue, "Queue dropped during sweep");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}
