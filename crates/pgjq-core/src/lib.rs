//! Core domain types and traits for the pgjq job queue.
//!
//! This crate contains:
//! - Queue names and job identifiers
//! - The job record and its status lifecycle
//! - Claim, listing and metrics value types
//! - The `JobStore` repository trait every engine algorithm runs against
//! - A `Clock` abstraction so time is injected rather than read globally

pub mod claim;
pub mod clock;
pub mod error;
pub mod id;
pub mod job;
pub mod listing;
pub mod metrics;
pub mod queue;
pub mod store;

pub use claim::{ClaimSpec, Eligibility, ReclaimPolicy, SweepReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use id::{JobId, QueueName};
pub use job::{Job, JobStatus, NewJob, Transition};
pub use listing::{JobFilter, JobPage, ListJobsRequest, OrderBy, SortBy, SortDir};
pub use metrics::{
    JobChartRecord, JobTimeline, MetricsResult, QueueStats, StatusCounts, TotalMetricsResult,
};
pub use queue::QueueSummary;
pub use store::JobStore;
