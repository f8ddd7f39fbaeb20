//! Job commands.

use anyhow::{Context, Result};
use pgjq_core::{JobId, JobStatus, ListJobsRequest, NewJob};
use pgjq_engine::Pgjq;
use serde_json::{Value, json};
use std::time::Duration;

use super::print_json;

fn parse_json(what: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", what))
}

pub async fn enqueue(
    pgjq: &Pgjq,
    queue: &str,
    payload: &str,
    priority: i32,
    stale_after: Option<Duration>,
    headers: Option<&str>,
) -> Result<()> {
    let payload = parse_json("payload", payload)?;
    let job_id = match headers {
        Some(headers) => {
            let stale_after = stale_after.unwrap_or(pgjq.default_stale_after());
            let job = NewJob::new(payload, stale_after)
                .with_priority(priority)
                .with_headers(parse_json("headers", headers)?);
            pgjq.enqueue_job(queue, job).await?
        }
        None => pgjq.enqueue(queue, payload, stale_after, priority).await?,
    };
    print_json(&json!({ "queue": queue, "job_id": job_id }))
}

pub async fn dequeue(pgjq: &Pgjq, queue: &str) -> Result<()> {
    print_json(&pgjq.dequeue(queue).await?)
}

pub async fn ack(pgjq: &Pgjq, queue: &str, id: i64) -> Result<()> {
    let acked = pgjq.ack(queue, JobId::new(id)).await?;
    print_json(&json!({ "job_id": id, "acked": acked }))
}

pub async fn nack(pgjq: &Pgjq, queue: &str, id: i64) -> Result<()> {
    let nacked = pgjq.nack(queue, JobId::new(id)).await?;
    print_json(&json!({ "job_id": id, "nacked": nacked }))
}

pub async fn cancel(pgjq: &Pgjq, queue: &str, id: i64) -> Result<()> {
    let cancelled = pgjq.cancel(queue, JobId::new(id)).await?;
    print_json(&json!({ "job_id": id, "cancelled": cancelled }))
}

pub async fn delete(pgjq: &Pgjq, queue: &str, id: i64) -> Result<()> {
    let deleted = pgjq.delete_job(queue, JobId::new(id)).await?;
    print_json(&json!({ "job_id": id, "deleted": deleted }))
}

pub async fn get(pgjq: &Pgjq, queue: &str, id: i64) -> Result<()> {
    print_json(&pgjq.get_job(queue, JobId::new(id)).await?)
}

pub async fn list(
    pgjq: &Pgjq,
    queue: &str,
    page: u32,
    per_page: u32,
    sort_by: &str,
    sort_dir: &str,
    statuses: &[String],
) -> Result<()> {
    let request = list_request(page, per_page, sort_by, sort_dir, statuses)?;
    print_json(&pgjq.list_jobs(queue, &request).await?)
}

fn list_request(
    page: u32,
    per_page: u32,
    sort_by: &str,
    sort_dir: &str,
    statuses: &[String],
) -> Result<ListJobsRequest> {
    let mut request = ListJobsRequest::default()
        .page(page, per_page)
        .sorted(sort_by.parse()?, sort_dir.parse()?);
    if !statuses.is_empty() {
        let statuses = statuses
            .iter()
            .map(|s| s.parse::<JobStatus>())
            .collect::<pgjq_core::Result<Vec<_>>>()?;
        request = request.with_statuses(statuses);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgjq_core::{SortBy, SortDir};

    #[test]
    fn test_list_request_from_flags() {
        let request = list_request(
            2,
            25,
            "dequeued_at",
            "DESC",
            &["pending".to_string(), "Active".to_string()],
        )
        .unwrap();
        assert_eq!(request.page, 2);
        assert_eq!(request.per_page, 25);
        assert_eq!(request.sort_by, SortBy::DequeuedAt);
        assert_eq!(request.sort_dir, SortDir::Desc);
        assert_eq!(
            request.statuses,
            Some(vec![JobStatus::Pending, JobStatus::Active])
        );
    }

    #[test]
    fn test_list_request_rejects_unknown_keys() {
        assert!(list_request(1, 10, "payload", "asc", &[]).is_err());
        assert!(list_request(1, 10, "job_id", "sideways", &[]).is_err());
        assert!(list_request(1, 10, "job_id", "asc", &["done".to_string()]).is_err());
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json("payload", r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(parse_json("payload", "{oops").is_err());
    }
}
