//! Claim and reclamation descriptions shared by the engine and the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::listing::{OrderBy, SortBy, SortDir};
use crate::{Job, JobId, JobStatus};

/// Which jobs a claim may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eligibility {
    /// Only pending jobs.
    Pending,
    /// Pending jobs, and active jobs whose window has expired but were not yet reaped.
    PendingOrExpired,
}

impl Eligibility {
    pub fn admits(&self, job: &Job, now: DateTime<Utc>) -> bool {
        match self {
            Eligibility::Pending => job.status == JobStatus::Pending,
            Eligibility::PendingOrExpired => {
                job.status == JobStatus::Pending || job.is_expired(now)
            }
        }
    }
}

/// Everything a store needs to perform one atomic claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimSpec {
    pub now: DateTime<Utc>,
    pub eligibility: Eligibility,
    pub order: Vec<OrderBy>,
    /// Replaces the job's own window when set.
    pub stale_after: Option<Duration>,
}

impl ClaimSpec {
    /// Claim order: highest priority, then oldest, then lowest id.
    pub fn delivery_order() -> Vec<OrderBy> {
        vec![
            OrderBy::new(SortBy::Priority, SortDir::Desc),
            OrderBy::new(SortBy::EnqueuedAt, SortDir::Asc),
            OrderBy::new(SortBy::JobId, SortDir::Asc),
        ]
    }

    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            eligibility: Eligibility::PendingOrExpired,
            order: Self::delivery_order(),
            stale_after: None,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }
}

/// What the staleness sweep does with an expired active job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimPolicy {
    /// Once a job has been claimed this many times, an expiry makes it `stale`.
    /// `None` requeues forever.
    pub max_reads: Option<i32>,
}

impl ReclaimPolicy {
    pub fn requeue_always() -> Self {
        Self { max_reads: None }
    }

    pub fn with_max_reads(max_reads: i32) -> Self {
        Self {
            max_reads: Some(max_reads),
        }
    }

    /// Status an expired job moves to given how often it was claimed.
    pub fn outcome(&self, read_ct: i32) -> JobStatus {
        match self.max_reads {
            Some(max) if read_ct >= max => JobStatus::Stale,
            _ => JobStatus::Pending,
        }
    }
}

/// Jobs touched by one staleness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Returned to pending for redelivery.
    pub requeued: Vec<JobId>,
    /// Moved to terminal `stale`.
    pub staled: Vec<JobId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.staled.is_empty()
    }

    pub fn total(&self) -> usize {
        self.requeued.len() + self.staled.len()
    }

    pub fn record(&mut self, job_id: JobId, status: JobStatus) {
        match status {
            JobStatus::Stale => self.staled.push(job_id),
            _ => self.requeued.push(job_id),
        }
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.requeued.extend(other.requeued);
        self.staled.extend(other.staled);
    }
}
