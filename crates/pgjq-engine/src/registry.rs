//! Queue lifecycle: create, drop, inspect and purge.

use pgjq_core::{Clock, Error, JobStore, QueueName, QueueSummary, Result};
use std::sync::Arc;
use tracing::info;

/// Provisions and tears down queues.
pub struct QueueRegistry {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl QueueRegistry {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a queue. Fails with `AlreadyExists` if it is already there.
    pub async fn create_queue(&self, queue: &QueueName) -> Result<()> {
        self.store.create_queue(queue, self.clock.now()).await?;
        info!(queue = %queue, "Created queue");
        Ok(())
    }

    /// Create the queue unless it exists. Returns whether it was created.
    pub async fn ensure_queue(&self, queue: &QueueName) -> Result<bool> {
        match self.create_queue(queue).await {
            Ok(()) => Ok(true),
            Err(Error::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drop a queue together with all of its jobs.
    pub async fn drop_queue(&self, queue: &QueueName) -> Result<bool> {
        let dropped = self.store.drop_queue(queue).await?;
        if dropped {
            info!(queue = %queue, "Dropped queue");
        }
        Ok(dropped)
    }

    pub async fn queue_exists(&self, queue: &QueueName) -> Result<bool> {
        self.store.queue_exists(queue).await
    }

    /// Every queue with its job count, ordered by name.
    pub async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        self.store.list_queues().await
    }

    /// Remove every job in the queue, whatever its status.
    pub async fn purge_queue(&self, queue: &QueueName) -> Result<u64> {
        let removed = self.store.purge(queue).await?;
        info!(queue = %queue, removed, "Purged queue");
        Ok(removed)
    }
}
