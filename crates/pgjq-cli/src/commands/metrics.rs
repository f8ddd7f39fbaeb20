//! Metrics commands.

use anyhow::Result;
use pgjq_engine::Pgjq;

use super::print_json;

pub async fn show(pgjq: &Pgjq, queue: Option<&str>, total: bool) -> Result<()> {
    if total {
        return print_json(&pgjq.get_total_metrics().await?);
    }
    match queue {
        Some(queue) => print_json(&pgjq.get_metrics(queue).await?),
        None => print_json(&pgjq.get_all_metrics().await?),
    }
}

pub async fn chart(pgjq: &Pgjq, queue: &str) -> Result<()> {
    print_json(&pgjq.get_jobs_chart(queue).await?)
}
