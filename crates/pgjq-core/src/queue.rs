//! Queue summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A queue as returned by `list_queues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub name: String,
    pub job_count: u64,
    pub created_at: DateTime<Utc>,
}
