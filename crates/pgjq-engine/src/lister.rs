//! Paginated job listing.

use pgjq_core::{Error, Job, JobId, JobPage, JobStore, ListJobsRequest, QueueName, Result};
use std::sync::Arc;

/// Reads jobs page by page with a stable order.
pub struct JobLister {
    store: Arc<dyn JobStore>,
    max_per_page: u32,
}

impl JobLister {
    pub fn new(store: Arc<dyn JobStore>, max_per_page: u32) -> Self {
        Self {
            store,
            max_per_page,
        }
    }

    /// One page of jobs plus the number of jobs matching the filter on any page.
    pub async fn list_jobs(&self, queue: &QueueName, request: &ListJobsRequest) -> Result<JobPage> {
        let (offset, limit) = request.bounds(self.max_per_page)?;

        self.store
            .find_page(queue, &request.filter(), &request.order(), offset, limit)
            .await
    }

    /// A single job. Unlike `ack`, a missing job is an error here.
    pub async fn get_job(&self, queue: &QueueName, job_id: JobId) -> Result<Job> {
        self.store
            .get_job(queue, job_id)
            .await?
            .ok_or_else(|| Error::JobNotFound(format!("{} in queue {}", job_id, queue)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClaimScheduler, JobQueue, QueueRegistry, testing};
    use pgjq_core::{JobStatus, SortBy, SortDir};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        jobs: JobQueue,
        scheduler: ClaimScheduler,
        registry: QueueRegistry,
        lister: JobLister,
        queue: QueueName,
    }

    async fn fixture(count: i32) -> Fixture {
        let (store, queue) = testing::store_with_queue("listing").await;
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        for i in 0..count {
            jobs.enqueue(&queue, json!({"i": i}), Duration::from_secs(60), i % 3)
                .await
                .unwrap();
            clock.advance(Duration::from_secs(1));
        }
        Fixture {
            jobs,
            scheduler: ClaimScheduler::new(store.clone(), clock.clone()),
            registry: QueueRegistry::new(store.clone(), clock),
            lister: JobLister::new(store, 1000),
            queue,
        }
    }

    #[tokio::test]
    async fn test_pagination_consistency() {
        let f = fixture(5).await;
        let request = ListJobsRequest::default().page(1, 2);
        let page = f.lister.list_jobs(&f.queue, &request).await.unwrap();

        assert_eq!(page.total_count, 5);
        let ids: Vec<i64> = page.jobs.iter().map(|j| j.job_id.get()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let last = f
            .lister
            .list_jobs(&f.queue, &ListJobsRequest::default().page(3, 2))
            .await
            .unwrap();
        assert_eq!(last.total_count, 5);
        assert_eq!(last.jobs.len(), 1);

        let beyond = f
            .lister
            .list_jobs(&f.queue, &ListJobsRequest::default().page(9, 2))
            .await
            .unwrap();
        assert_eq!(beyond.total_count, 5);
        assert!(beyond.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_sort_by_priority_desc_breaks_ties_by_id() {
        let f = fixture(6).await;
        let request = ListJobsRequest::default()
            .page(1, 6)
            .sorted(SortBy::Priority, SortDir::Desc);
        let page = f.lister.list_jobs(&f.queue, &request).await.unwrap();

        let keys: Vec<(i32, i64)> = page
            .jobs
            .iter()
            .map(|j| (j.priority, j.job_id.get()))
            .collect();
        let mut expected = keys.clone();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        assert_eq!(keys, expected);
        assert_eq!(keys[0].0, 2);
    }

    #[tokio::test]
    async fn test_sort_by_dequeued_at_puts_nulls_last() {
        let f = fixture(3).await;
        let claimed = f.scheduler.dequeue(&f.queue).await.unwrap().unwrap();

        let asc = ListJobsRequest::default().sorted(SortBy::DequeuedAt, SortDir::Asc);
        let page = f.lister.list_jobs(&f.queue, &asc).await.unwrap();
        assert_eq!(page.jobs[0].job_id, claimed.job_id);

        let desc = ListJobsRequest::default().sorted(SortBy::DequeuedAt, SortDir::Desc);
        let page = f.lister.list_jobs(&f.queue, &desc).await.unwrap();
        assert_eq!(page.jobs[2].job_id, claimed.job_id);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let f = fixture(4).await;
        let claimed = f.scheduler.dequeue(&f.queue).await.unwrap().unwrap();
        f.jobs.ack(&f.queue, claimed.job_id).await.unwrap();

        let request = ListJobsRequest::default().with_statuses([JobStatus::Completed]);
        let page = f.lister.list_jobs(&f.queue, &request).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.jobs[0].job_id, claimed.job_id);

        let request = ListJobsRequest::default()
            .page(1, 1)
            .with_statuses([JobStatus::Pending, JobStatus::Active]);
        let page = f.lister.list_jobs(&f.queue, &request).await.unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_paging() {
        let f = fixture(1).await;
        for request in [
            ListJobsRequest::default().page(0, 10),
            ListJobsRequest::default().page(1, 0),
            ListJobsRequest::default().page(1, 1001),
        ] {
            let err = f.lister.list_jobs(&f.queue, &request).await.unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_purge_empties_listing() {
        let f = fixture(3).await;
        assert_eq!(f.registry.purge_queue(&f.queue).await.unwrap(), 3);
        let page = f
            .lister
            .list_jobs(&f.queue, &ListJobsRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let f = fixture(1).await;
        let err = f.lister.get_job(&f.queue, JobId::new(777)).await.unwrap_err();
        assert!(matches!(err, Error::JobNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_total_matches_page_under_concurrent_claims() {
        let f = fixture(120).await;
        let scheduler = std::sync::Arc::new(f.scheduler);
        let claimers: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = scheduler.clone();
                let queue = f.queue.clone();
                tokio::spawn(async move {
                    while scheduler.dequeue(&queue).await.unwrap().is_some() {
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let request = ListJobsRequest::default()
            .page(1, 25)
            .with_statuses([JobStatus::Pending]);
        loop {
            let page = f.lister.list_jobs(&f.queue, &request).await.unwrap();
            let expected = usize::try_from(page.total_count).unwrap().min(25);
            assert_eq!(page.jobs.len(), expected);
            assert!(page.jobs.iter().all(|job| job.status == JobStatus::Pending));
            if page.total_count == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        for claimer in claimers {
            claimer.await.unwrap();
        }
    }
}
