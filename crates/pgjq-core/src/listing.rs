//! Listing, filtering and ordering of jobs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{Error, Job, JobStatus, Result};

/// Upper bound on `per_page` unless configured otherwise.
pub const DEFAULT_MAX_PER_PAGE: u32 = 1000;

/// Column a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    JobId,
    ReadCt,
    EnqueuedAt,
    DequeuedAt,
    Status,
    Priority,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::JobId => "job_id",
            SortBy::ReadCt => "read_ct",
            SortBy::EnqueuedAt => "enqueued_at",
            SortBy::DequeuedAt => "dequeued_at",
            SortBy::Status => "status",
            SortBy::Priority => "priority",
        }
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job_id" => Ok(SortBy::JobId),
            "read_ct" => Ok(SortBy::ReadCt),
            "enqueued_at" => Ok(SortBy::EnqueuedAt),
            "dequeued_at" => Ok(SortBy::DequeuedAt),
            "status" => Ok(SortBy::Status),
            "priority" => Ok(SortBy::Priority),
            other => Err(Error::InvalidArgument(format!("unknown sort_by: {}", other))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

impl std::fmt::Display for SortDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl std::str::FromStr for SortDir {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            other => Err(Error::InvalidArgument(format!("unknown sort_dir: {}", other))),
        }
    }
}

/// One ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: SortBy,
    pub dir: SortDir,
}

impl OrderBy {
    pub fn new(key: SortBy, dir: SortDir) -> Self {
        Self { key, dir }
    }

    /// Compare two jobs on this term.
    ///
    /// Absent values sort after present ones ascending and before them descending,
    /// which is how PostgreSQL orders NULLs by default.
    pub fn compare(&self, a: &Job, b: &Job) -> Ordering {
        let ord = match self.key {
            SortBy::JobId => a.job_id.cmp(&b.job_id),
            SortBy::ReadCt => a.read_ct.cmp(&b.read_ct),
            SortBy::EnqueuedAt => a.enqueued_at.cmp(&b.enqueued_at),
            SortBy::DequeuedAt => nulls_last(&a.dequeued_at, &b.dequeued_at),
            SortBy::Status => a.status.cmp(&b.status),
            SortBy::Priority => a.priority.cmp(&b.priority),
        };
        match self.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }

    /// Compare on a list of terms, first difference wins.
    pub fn compare_all(order: &[OrderBy], a: &Job, b: &Job) -> Ordering {
        order
            .iter()
            .map(|term| term.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Status filter for listing and counting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    /// `None` matches every status.
    pub statuses: Option<Vec<JobStatus>>,
}

impl JobFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn statuses(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            statuses: Some(statuses.into_iter().collect()),
        }
    }

    pub fn matches(&self, status: JobStatus) -> bool {
        match &self.statuses {
            Some(statuses) => statuses.contains(&status),
            None => true,
        }
    }

    /// Status names for binding into a query.
    pub fn status_names(&self) -> Option<Vec<String>> {
        self.statuses
            .as_ref()
            .map(|statuses| statuses.iter().map(|s| s.as_str().to_string()).collect())
    }
}

/// A request for one page of jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListJobsRequest {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    pub sort_by: SortBy,
    pub sort_dir: SortDir,
    pub statuses: Option<Vec<JobStatus>>,
}

impl Default for ListJobsRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
            sort_by: SortBy::JobId,
            sort_dir: SortDir::Asc,
            statuses: None,
        }
    }
}

impl ListJobsRequest {
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn sorted(mut self, sort_by: SortBy, sort_dir: SortDir) -> Self {
        self.sort_by = sort_by;
        self.sort_dir = sort_dir;
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn filter(&self) -> JobFilter {
        JobFilter {
            statuses: self.statuses.clone(),
        }
    }

    /// Requested order followed by `job_id ASC` so pages never overlap.
    pub fn order(&self) -> Vec<OrderBy> {
        let mut order = vec![OrderBy::new(self.sort_by, self.sort_dir)];
        if self.sort_by != SortBy::JobId {
            order.push(OrderBy::new(SortBy::JobId, SortDir::Asc));
        }
        order
    }

    /// Check paging bounds and return `(offset, limit)`.
    pub fn bounds(&self, max_per_page: u32) -> Result<(u64, u64)> {
        if self.page == 0 {
            return Err(Error::InvalidArgument("page must be >= 1".to_string()));
        }
        if self.per_page == 0 || self.per_page > max_per_page {
            return Err(Error::InvalidArgument(format!(
                "per_page must be between 1 and {}, got {}",
                max_per_page, self.per_page
            )));
        }
        let offset = u64::from(self.page - 1) * u64::from(self.per_page);
        if offset > i64::MAX as u64 {
            return Err(Error::InvalidArgument(format!(
                "page {} is out of range",
                self.page
            )));
        }
        Ok((offset, u64::from(self.per_page)))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
    /// Every job matching the filter, regardless of paging.
    pub total_count: u64,
    pub jobs: Vec<Job>,
}
