//! Queue commands.

use anyhow::Result;
use pgjq_engine::Pgjq;
use serde_json::json;

use super::print_json;

pub async fn create(pgjq: &Pgjq, name: &str, if_not_exists: bool) -> Result<()> {
    let created = if if_not_exists {
        pgjq.ensure_queue(name).await?
    } else {
        pgjq.create_queue(name).await?;
        true
    };
    print_json(&json!({ "queue": name, "created": created }))
}

pub async fn drop(pgjq: &Pgjq, name: &str) -> Result<()> {
    let dropped = pgjq.drop_queue(name).await?;
    print_json(&json!({ "queue": name, "dropped": dropped }))
}

pub async fn exists(pgjq: &Pgjq, name: &str) -> Result<()> {
    let exists = pgjq.queue_exists(name).await?;
    print_json(&json!({ "queue": name, "exists": exists }))
}

pub async fn list(pgjq: &Pgjq) -> Result<()> {
    print_json(&pgjq.list_queues().await?)
}

pub async fn purge(pgjq: &Pgjq, name: &str) -> Result<()> {
    let removed = pgjq.purge_queue(name).await?;
    print_json(&json!({ "queue": name, "removed": removed }))
}
