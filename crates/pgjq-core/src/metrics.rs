//! Metrics value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobStatus};

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending_count: u64,
    pub active_count: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub cancelled_count: u64,
    pub staled_count: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus, n: u64) {
        match status {
            JobStatus::Pending => self.pending_count += n,
            JobStatus::Active => self.active_count += n,
            JobStatus::Completed => self.completed_count += n,
            JobStatus::Failed => self.failed_count += n,
            JobStatus::Cancelled => self.cancelled_count += n,
            JobStatus::Stale => self.staled_count += n,
        }
    }

    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Pending => self.pending_count,
            JobStatus::Active => self.active_count,
            JobStatus::Completed => self.completed_count,
            JobStatus::Failed => self.failed_count,
            JobStatus::Cancelled => self.cancelled_count,
            JobStatus::Stale => self.staled_count,
        }
    }

    pub fn total(&self) -> u64 {
        JobStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        for status in JobStatus::ALL {
            self.add(status, other.get(status));
        }
    }
}

/// Raw per-queue aggregates as a store reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub counts: StatusCounts,
    /// Pending plus expired-active jobs at the time of the scrape.
    pub visible_count: u64,
    pub oldest_pending_at: Option<DateTime<Utc>>,
    pub newest_pending_at: Option<DateTime<Utc>>,
}

/// Live metrics for one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub queue_name: String,
    /// Pending jobs.
    pub queue_length: u64,
    /// Jobs a `dequeue` could return right now.
    pub queue_visible_length: u64,
    pub newest_job_age_sec: Option<i64>,
    pub oldest_job_age_sec: Option<i64>,
    pub total_jobs: u64,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub scrape_time: DateTime<Utc>,
}

/// Metrics summed over every queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalMetricsResult {
    pub total_queues: u64,
    pub total_jobs: u64,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub scrape_time: DateTime<Utc>,
}

/// Lifecycle timestamps of one job, enough to reconstruct its status at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimeline {
    pub enqueued_at: DateTime<Utc>,
    pub dequeued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub staled_at: Option<DateTime<Utc>>,
}

impl JobTimeline {
    /// Status the job had at `at`, or `None` if it did not exist yet.
    ///
    /// Only the latest claim is recorded, so a requeued job reads as pending
    /// between its earlier claims.
    pub fn status_at(&self, at: DateTime<Utc>) -> Option<JobStatus> {
        if self.enqueued_at > at {
            return None;
        }
        let reached = |ts: Option<DateTime<Utc>>| ts.map(|ts| ts <= at).unwrap_or(false);

        let status = if reached(self.completed_at) {
            JobStatus::Completed
        } else if reached(self.failed_at) {
            JobStatus::Failed
        } else if reached(self.cancelled_at) {
            JobStatus::Cancelled
        } else if reached(self.staled_at) {
            JobStatus::Stale
        } else if reached(self.dequeued_at) {
            JobStatus::Active
        } else {
            JobStatus::Pending
        };
        Some(status)
    }
}

impl From<&Job> for JobTimeline {
    fn from(job: &Job) -> Self {
        Self {
            enqueued_at: job.enqueued_at,
            dequeued_at: job.dequeued_at,
            completed_at: job.completed_at,
            failed_at: job.failed_at,
            cancelled_at: job.cancelled_at,
            staled_at: job.staled_at,
        }
    }
}

/// One point of a jobs-over-time chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChartRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub counts: StatusCounts,
}
