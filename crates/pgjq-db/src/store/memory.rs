//! In-memory job store.
//!
//! Mirrors the PostgreSQL store's semantics inside one process. Each job row carries a
//! claim flag next to its data: claims and sweeps take the flag with a compare-and-set and
//! skip rows another caller holds, the same way `SKIP LOCKED` does. Readers only take the
//! data's read lock and never touch the flag.
//! Lock order is always queue rows, then a row's flag, then its data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pgjq_core::{
    ClaimSpec, Error, Job, JobFilter, JobId, JobPage, JobStatus, JobStore, JobTimeline, NewJob,
    OrderBy, QueueName, QueueStats, QueueSummary, ReclaimPolicy, Result, SweepReport, Transition,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::debug;

/// One job plus the lock claimants and sweeps contend on.
struct JobRow {
    locked: AtomicBool,
    job: RwLock<Job>,
}

impl JobRow {
    fn new(job: Job) -> Self {
        Self {
            locked: AtomicBool::new(false),
            job: RwLock::new(job),
        }
    }

    fn read(&self) -> Job {
        self.job.read().clone()
    }

    /// Take the row lock without waiting; `None` when another claim or sweep holds it.
    fn try_lock(&self) -> Option<RowLock<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RowLock { row: self })
    }
}

/// Held row lock, released on drop.
struct RowLock<'a> {
    row: &'a JobRow,
}

impl RowLock<'_> {
    fn update<T>(&self, f: impl FnOnce(&mut Job) -> T) -> T {
        let mut job = self.row.job.write();
        f(&mut *job)
    }
}

impl Drop for RowLock<'_> {
    fn drop(&mut self) {
        self.row.locked.store(false, Ordering::Release);
    }
}

struct MemoryQueue {
    created_at: DateTime<Utc>,
    rows: RwLock<BTreeMap<JobId, Arc<JobRow>>>,
}

impl MemoryQueue {
    fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    fn snapshot(&self) -> Vec<Job> {
        let rows = self.rows.read();
        rows.values().map(|row| row.read()).collect()
    }
}

/// Process-local JobStore for tests and embedded use.
pub struct MemoryJobStore {
    queues: RwLock<BTreeMap<String, Arc<MemoryQueue>>>,
    next_id: AtomicI64,
    closed: AtomicBool,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Unavailable("memory store is closed".to_string()));
        }
        Ok(())
    }

    fn queue(&self, queue: &QueueName) -> Result<Arc<MemoryQueue>> {
        self.check_open()?;
        self.queues
            .read()
            .get(queue.as_str())
            .cloned()
            .ok_or_else(|| Error::QueueNotFound(queue.to_string()))
    }

    /// Test hook: a job's row, so callers can simulate a concurrent lock holder.
    #[cfg(test)]
    fn row(&self, queue: &QueueName, job_id: JobId) -> Option<Arc<JobRow>> {
        let queue = self.queue(queue).ok()?;
        let rows = queue.rows.read();
        rows.get(&job_id).cloned()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_queue(&self, queue: &QueueName, now: DateTime<Utc>) -> Result<()> {
        self.check_open()?;
        let mut queues = self.queues.write();
        if queues.contains_key(queue.as_str()) {
            return Err(Error::AlreadyExists(format!("queue {}", queue)));
        }
        queues.insert(queue.to_string(), Arc::new(MemoryQueue::new(now)));
        Ok(())
    }

    async fn drop_queue(&self, queue: &QueueName) -> Result<bool> {
        self.check_open()?;
        Ok(self.queues.write().remove(queue.as_str()).is_some())
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool> {
        self.check_open()?;
        Ok(self.queues.read().contains_key(queue.as_str()))
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        self.check_open()?;
        let queues = self.queues.read();
        Ok(queues
            .iter()
            .map(|(name, queue)| QueueSummary {
                name: name.clone(),
                job_count: queue.rows.read().len() as u64,
                created_at: queue.created_at,
            })
            .collect())
    }

    async fn insert_job(
        &self,
        queue: &QueueName,
        job: NewJob,
        now: DateTime<Utc>,
    ) -> Result<JobId> {
        let queue = self.queue(queue)?;
        let job_id = JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let row = Arc::new(JobRow::new(Job::pending(job_id, job, now)));
        queue.rows.write().insert(job_id, row);
        Ok(job_id)
    }

    async fn claim(&self, queue: &QueueName, spec: &ClaimSpec) -> Result<Option<Job>> {
        let queue = self.queue(queue)?;
        let rows = queue.rows.read();

        let mut candidates: Vec<Job> = rows
            .values()
            .map(|row| row.read())
            .filter(|job| spec.eligibility.admits(job, spec.now))
            .collect();
        candidates.sort_by(|a, b| OrderBy::compare_all(&spec.order, a, b));

        for candidate in candidates {
            let Some(row) = rows.get(&candidate.job_id) else {
                continue;
            };
            let Some(lock) = row.try_lock() else {
                continue;
            };
            let claimed = lock.update(|job| {
                // Another claim or a transition may have changed the row since the snapshot.
                if !spec.eligibility.admits(job, spec.now) {
                    return None;
                }
                job.mark_claimed(spec.now, spec.stale_after);
                Some(job.clone())
            });
            if let Some(job) = claimed {
                debug!(job_id = %job.job_id, read_ct = job.read_ct, "claimed job");
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    async fn transition(
        &self,
        queue: &QueueName,
        job_id: JobId,
        transition: &Transition,
    ) -> Result<bool> {
        let queue = self.queue(queue)?;
        let rows = queue.rows.read();
        let Some(row) = rows.get(&job_id) else {
            return Ok(false);
        };

        // Like a plain UPDATE, a transition waits on the data lock instead of skipping.
        let mut job = row.job.write();
        if !transition.applies_to(job.status) {
            return Ok(false);
        }
        job.apply_status(transition.to, transition.at);
        Ok(true)
    }

    async fn reclaim_expired(
        &self,
        queue: &QueueName,
        now: DateTime<Utc>,
        policy: &ReclaimPolicy,
    ) -> Result<SweepReport> {
        let queue = self.queue(queue)?;
        let rows = queue.rows.read();

        let mut report = SweepReport::default();
        for row in rows.values() {
            let Some(lock) = row.try_lock() else {
                continue;
            };
            let reclaimed = lock.update(|job| {
                if !job.is_expired(now) {
                    return None;
                }
                let outcome = policy.outcome(job.read_ct);
                job.apply_status(outcome, now);
                Some((job.job_id, outcome))
            });
            if let Some((job_id, outcome)) = reclaimed {
                report.record(job_id, outcome);
            }
        }
        Ok(report)
    }

    async fn delete_job(&self, queue: &QueueName, job_id: JobId) -> Result<bool> {
        let queue = self.queue(queue)?;
        let removed = queue.rows.write().remove(&job_id).is_some();
        Ok(removed)
    }

    async fn purge(&self, queue: &QueueName) -> Result<u64> {
        let queue = self.queue(queue)?;
        let mut rows = queue.rows.write();
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }

    async fn get_job(&self, queue: &QueueName, job_id: JobId) -> Result<Option<Job>> {
        let queue = self.queue(queue)?;
        let rows = queue.rows.read();
        Ok(rows.get(&job_id).map(|row| row.read()))
    }

    async fn find_page(
        &self,
        queue: &QueueName,
        filter: &JobFilter,
        order: &[OrderBy],
        offset: u64,
        limit: u64,
    ) -> Result<JobPage> {
        let queue = self.queue(queue)?;
        let mut jobs: Vec<Job> = queue
            .snapshot()
            .into_iter()
            .filter(|job| filter.matches(job.status))
            .collect();
        jobs.sort_by(|a, b| OrderBy::compare_all(order, a, b));

        let total_count = jobs.len() as u64;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(JobPage {
            total_count,
            jobs: jobs.into_iter().skip(offset).take(limit).collect(),
        })
    }

    async fn queue_stats(&self, queue: &QueueName, now: DateTime<Utc>) -> Result<QueueStats> {
        let queue = self.queue(queue)?;

        let mut stats = QueueStats::default();
        for job in queue.snapshot() {
            stats.counts.add(job.status, 1);
            if job.status == JobStatus::Pending || job.is_expired(now) {
                stats.visible_count += 1;
            }
            if job.status == JobStatus::Pending {
                stats.oldest_pending_at = Some(match stats.oldest_pending_at {
                    Some(oldest) => oldest.min(job.enqueued_at),
                    None => job.enqueued_at,
                });
                stats.newest_pending_at = Some(match stats.newest_pending_at {
                    Some(newest) => newest.max(job.enqueued_at),
                    None => job.enqueued_at,
                });
            }
        }
        Ok(stats)
    }

    async fn timelines(&self, queue: &QueueName) -> Result<Vec<JobTimeline>> {
        let queue = self.queue(queue)?;
        Ok(queue.snapshot().iter().map(JobTimeline::from).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.check_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
