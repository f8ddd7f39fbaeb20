//! The job record and its status lifecycle.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Error, JobId, Result};

/// Status of a job.
///
/// Variant order is the sort order used when listing by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a consumer; hidden from other claimants until its window expires.
    Active,
    /// Acknowledged by the consumer.
    Completed,
    /// Rejected by the consumer.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Window expired too many times; no further delivery.
    Stale,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Active,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
        JobStatus::Stale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Stale => "stale",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Stale
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "stale" => Ok(JobStatus::Stale),
            other => Err(Error::InvalidArgument(format!("unknown job status: {}", other))),
        }
    }
}

/// A job as stored in its queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub payload: serde_json::Value,
    pub headers: Option<serde_json::Value>,
    pub priority: i32,
    /// Visibility window granted on each claim.
    pub stale_after: Duration,
    /// Number of successful claims.
    pub read_ct: i32,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub dequeued_at: Option<DateTime<Utc>>,
    pub staled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build the pending record for a freshly enqueued job.
    pub fn pending(job_id: JobId, new: NewJob, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            payload: new.payload,
            headers: new.headers,
            priority: new.priority,
            stale_after: new.stale_after,
            read_ct: 0,
            status: JobStatus::Pending,
            enqueued_at,
            dequeued_at: None,
            staled_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
        }
    }

    /// Instant at which the current claim stops hiding the job.
    pub fn visible_at(&self) -> Option<DateTime<Utc>> {
        let dequeued_at = self.dequeued_at?;
        let window = TimeDelta::from_std(self.stale_after).ok()?;
        dequeued_at.checked_add_signed(window)
    }

    /// Active with an expired visibility window, whether or not the reaper has run.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Active
            && self.visible_at().map(|at| at <= now).unwrap_or(false)
    }

    /// Timestamp of the terminal transition, if any.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
            .or(self.failed_at)
            .or(self.cancelled_at)
            .or(self.staled_at)
    }

    /// Apply a claim: the caller has already established eligibility under a row lock.
    pub fn mark_claimed(&mut self, now: DateTime<Utc>, stale_after: Option<Duration>) {
        self.status = JobStatus::Active;
        self.dequeued_at = Some(now);
        self.read_ct += 1;
        if let Some(window) = stale_after {
            self.stale_after = window;
        }
    }

    /// Apply a status change, stamping the matching lifecycle timestamp.
    pub fn apply_status(&mut self, status: JobStatus, at: DateTime<Utc>) {
        self.status = status;
        match status {
            JobStatus::Pending => self.dequeued_at = None,
            JobStatus::Active => self.dequeued_at = Some(at),
            JobStatus::Completed => self.completed_at = Some(at),
            JobStatus::Failed => self.failed_at = Some(at),
            JobStatus::Cancelled => self.cancelled_at = Some(at),
            JobStatus::Stale => self.staled_at = Some(at),
        }
    }
}

/// Producer-side description of a job to enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub payload: serde_json::Value,
    pub headers: Option<serde_json::Value>,
    pub priority: i32,
    pub stale_after: Duration,
}

impl NewJob {
    pub fn new(payload: serde_json::Value, stale_after: Duration) -> Self {
        Self {
            payload,
            headers: None,
            priority: 0,
            stale_after,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_headers(mut self, headers: serde_json::Value) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Reject windows stores cannot represent and truncate to millisecond precision.
    pub fn validated(mut self) -> Result<Self> {
        let millis = self.stale_after.as_millis();
        if millis == 0 {
            return Err(Error::InvalidArgument(
                "stale_after must be at least one millisecond".to_string(),
            ));
        }
        if millis > i64::MAX as u128 {
            return Err(Error::InvalidArgument(format!(
                "stale_after too large: {:?}",
                self.stale_after
            )));
        }
        self.stale_after = Duration::from_millis(millis as u64);
        Ok(self)
    }
}

/// A compare-and-set status change.
///
/// Applies only when the stored status is one of `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Vec<JobStatus>,
    pub to: JobStatus,
    pub at: DateTime<Utc>,
}

impl Transition {
    /// active -> completed
    pub fn ack(at: DateTime<Utc>) -> Self {
        Self {
            from: vec![JobStatus::Active],
            to: JobStatus::Completed,
            at,
        }
    }

    /// active -> failed
    pub fn nack(at: DateTime<Utc>) -> Self {
        Self {
            from: vec![JobStatus::Active],
            to: JobStatus::Failed,
            at,
        }
    }

    /// pending | active -> cancelled
    pub fn cancel(at: DateTime<Utc>) -> Self {
        Self {
            from: vec![JobStatus::Pending, JobStatus::Active],
            to: JobStatus::Cancelled,
            at,
        }
    }

    pub fn applies_to(&self, status: JobStatus) -> bool {
        self.from.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_status_round_trip_through_text() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!("ACTIVE".parse::<JobStatus>().unwrap(), JobStatus::Active);
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Active.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Stale.is_terminal());
    }

    #[test]
    fn test_expiry_follows_window() {
        let new = NewJob::new(json!({"task": "x"}), Duration::from_secs(30));
        let mut job = Job::pending(JobId::new(1), new, at(0));
        assert!(!job.is_expired(at(100)));

        job.mark_claimed(at(10), None);
        assert_eq!(job.read_ct, 1);
        assert_eq!(job.visible_at(), Some(at(40)));
        assert!(!job.is_expired(at(39)));
        assert!(job.is_expired(at(40)));
    }

    #[test]
    fn test_claim_override_replaces_window() {
        let new = NewJob::new(json!(null), Duration::from_secs(600));
        let mut job = Job::pending(JobId::new(1), new, at(0));
        job.mark_claimed(at(0), Some(Duration::from_secs(5)));
        assert_eq!(job.stale_after, Duration::from_secs(5));
    }

    #[test]
    fn test_validated_rejects_zero_window() {
        let zero = NewJob::new(json!({}), Duration::ZERO);
        assert!(matches!(zero.validated(), Err(Error::InvalidArgument(_))));

        let fine = NewJob::new(json!({}), Duration::from_micros(1_500))
            .validated()
            .unwrap();
        assert_eq!(fine.stale_after, Duration::from_millis(1));
    }

    #[test]
    fn test_transition_sources() {
        assert!(Transition::ack(at(0)).applies_to(JobStatus::Active));
        assert!(!Transition::ack(at(0)).applies_to(JobStatus::Pending));
        assert!(Transition::cancel(at(0)).applies_to(JobStatus::Pending));
        assert!(!Transition::cancel(at(0)).applies_to(JobStatus::Completed));
    }
}
