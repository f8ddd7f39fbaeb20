//! Queue names and job identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identifier of a job within its queue.
/// Assigned at enqueue and strictly increasing, so it doubles as the FIFO tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct JobId(i64);

impl JobId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::str::FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::InvalidArgument(format!("invalid job id: {}", s)))
    }
}

/// Maximum length of a queue name.
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// A validated queue name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct QueueName(String);

impl QueueName {
    /// Validate and wrap a queue name.
    ///
    /// Names are 1 to 64 ASCII characters drawn from letters, digits, `_` and `-`,
    /// starting with a letter or `_`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_QUEUE_NAME_LEN {
            return Err(Error::InvalidArgument(format!(
                "queue name must be 1-{} characters, got {}",
                MAX_QUEUE_NAME_LEN,
                name.len()
            )));
        }

        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(Error::InvalidArgument(format!(
                "invalid queue name: {}",
                name
            )));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for QueueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QueueName {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        Self::new(name)
    }
}

impl TryFrom<&str> for QueueName {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        Self::new(name)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}

impl std::str::FromStr for QueueName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
