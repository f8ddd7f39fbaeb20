//! Live queue metrics and the jobs-over-time chart.

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::try_join_all;
use pgjq_config::ChartConfig;
use pgjq_core::{
    Clock, Error, JobChartRecord, JobStore, JobTimeline, MetricsResult, QueueName, Result,
    StatusCounts, TotalMetricsResult,
};
use std::sync::Arc;

/// Computes metrics straight from the store on every call.
pub struct MetricsAggregator {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    chart: ChartConfig,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, chart: ChartConfig) -> Self {
        Self {
            store,
            clock,
            chart,
        }
    }

    pub async fn get_metrics(&self, queue: &QueueName) -> Result<MetricsResult> {
        let now = self.clock.now();
        let stats = self.store.queue_stats(queue, now).await?;
        let age = |at: DateTime<Utc>| (now - at).num_seconds().max(0);

        Ok(MetricsResult {
            queue_name: queue.to_string(),
            queue_length: stats.counts.pending_count,
            queue_visible_length: stats.visible_count,
            newest_job_age_sec: stats.newest_pending_at.map(age),
            oldest_job_age_sec: stats.oldest_pending_at.map(age),
            total_jobs: stats.counts.total(),
            counts: stats.counts,
            scrape_time: now,
        })
    }

    /// Metrics for every queue, ordered by name.
    pub async fn get_all_metrics(&self) -> Result<Vec<MetricsResult>> {
        let queues = self
            .store
            .list_queues()
            .await?
            .into_iter()
            .map(|summary| QueueName::new(summary.name))
            .collect::<Result<Vec<_>>>()?;
        let results = try_join_all(queues.iter().map(|queue| self.scrape(queue))).await?;
        Ok(results.into_iter().flatten().collect())
    }

    async fn scrape(&self, queue: &QueueName) -> Result<Option<MetricsResult>> {
        match self.get_metrics(queue).await {
            Ok(metrics) => Ok(Some(metrics)),
            // Dropped after it was listed.
            Err(Error::QueueNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_total_metrics(&self) -> Result<TotalMetricsResult> {
        let all = self.get_all_metrics().await?;
        let mut counts = StatusCounts::default();
        for metrics in &all {
            counts.merge(&metrics.counts);
        }

        Ok(TotalMetricsResult {
            total_queues: all.len() as u64,
            total_jobs: counts.total(),
            counts,
            scrape_time: self.clock.now(),
        })
    }

    /// Status counts at evenly spaced instants over the configured span, ending now.
    pub async fn get_jobs_chart(&self, queue: &QueueName) -> Result<Vec<JobChartRecord>> {
        let now = self.clock.now();
        let timelines = self.store.timelines(queue).await?;
        Ok(chart_points(now, &self.chart)
            .into_iter()
            .map(|timestamp| JobChartRecord {
                timestamp,
                counts: counts_at(&timelines, timestamp),
            })
            .collect())
    }
}

fn chart_points(now: DateTime<Utc>, chart: &ChartConfig) -> Vec<DateTime<Utc>> {
    let buckets = i64::from(chart.buckets.max(1));
    if buckets == 1 {
        return vec![now];
    }
    let span = TimeDelta::from_std(chart.span).unwrap_or_else(|_| TimeDelta::zero());
    let step_ms = span.num_milliseconds() / (buckets - 1);

    (0..buckets)
        .map(|i| {
            let back = TimeDelta::milliseconds(step_ms.saturating_mul(buckets - 1 - i));
            now.checked_sub_signed(back).unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
        .collect()
}

fn counts_at(timelines: &[JobTimeline], at: DateTime<Utc>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for status in timelines.iter().filter_map(|t| t.status_at(at)) {
        counts.add(status, 1);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClaimScheduler, JobQueue, testing};
    use pgjq_core::JobStatus;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        jobs: JobQueue,
        scheduler: ClaimScheduler,
        metrics: MetricsAggregator,
        clock: Arc<pgjq_core::ManualClock>,
        queue: QueueName,
    }

    async fn fixture(chart: ChartConfig) -> Fixture {
        let (store, queue) = testing::store_with_queue("metrics").await;
        let clock = testing::clock();
        Fixture {
            jobs: JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60)),
            scheduler: ClaimScheduler::new(store.clone(), clock.clone()),
            metrics: MetricsAggregator::new(store, clock.clone(), chart),
            clock,
            queue,
        }
    }

    #[tokio::test]
    async fn test_empty_queue_metrics() {
        let f = fixture(ChartConfig::default()).await;
        let m = f.metrics.get_metrics(&f.queue).await.unwrap();
        assert_eq!(m.queue_name, "metrics");
        assert_eq!(m.queue_length, 0);
        assert_eq!(m.total_jobs, 0);
        assert_eq!(m.oldest_job_age_sec, None);
        assert_eq!(m.newest_job_age_sec, None);
    }

    #[tokio::test]
    async fn test_metrics_counts_and_ages() {
        let f = fixture(ChartConfig::default()).await;
        let q = &f.queue;

        f.jobs.enqueue(q, json!(1), Duration::from_secs(10), 0).await.unwrap();
        f.clock.advance(Duration::from_secs(20));
        f.jobs.enqueue(q, json!(2), Duration::from_secs(10), 0).await.unwrap();
        f.clock.advance(Duration::from_secs(5));
        let active = f.jobs.enqueue(q, json!(3), Duration::from_secs(10), 9).await.unwrap();
        f.scheduler.dequeue(q).await.unwrap();
        let done = f.jobs.enqueue(q, json!(4), Duration::from_secs(10), 9).await.unwrap();
        f.scheduler.dequeue(q).await.unwrap();
        f.jobs.ack(q, done).await.unwrap();
        f.clock.advance(Duration::from_secs(5));

        let m = f.metrics.get_metrics(q).await.unwrap();
        assert_eq!(m.queue_length, 2);
        assert_eq!(m.queue_visible_length, 2);
        assert_eq!(m.oldest_job_age_sec, Some(30));
        assert_eq!(m.newest_job_age_sec, Some(10));
        assert_eq!(m.counts.active_count, 1);
        assert_eq!(m.counts.completed_count, 1);
        assert_eq!(m.total_jobs, 4);
        assert_eq!(m.scrape_time, f.clock.now());

        // The active job's window has run out, so it is visible again.
        f.clock.advance(Duration::from_secs(10));
        let m = f.metrics.get_metrics(q).await.unwrap();
        assert_eq!(m.queue_visible_length, 3);
        assert_eq!(m.counts.get(JobStatus::Active), 1);
        assert!(f.jobs.get_job(q, active).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_all_and_total_metrics() {
        let (store, first) = testing::store_with_queue("first").await;
        let second = QueueName::new("second").unwrap();
        store.create_queue(&second, testing::start()).await.unwrap();
        let clock = testing::clock();
        let jobs = JobQueue::new(store.clone(), clock.clone(), Duration::from_secs(60));
        let metrics = MetricsAggregator::new(store, clock, ChartConfig::default());

        jobs.enqueue_with_defaults(&first, json!(1)).await.unwrap();
        jobs.enqueue_with_defaults(&second, json!(2)).await.unwrap();
        jobs.enqueue_with_defaults(&second, json!(3)).await.unwrap();

        let all = metrics.get_all_metrics().await.unwrap();
        let names: Vec<&str> = all.iter().map(|m| m.queue_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(all[1].queue_length, 2);

        let total = metrics.get_total_metrics().await.unwrap();
        assert_eq!(total.total_queues, 2);
        assert_eq!(total.total_jobs, 3);
        assert_eq!(total.counts.pending_count, 3);
    }

    #[tokio::test]
    async fn test_jobs_chart_reconstructs_history() {
        let chart = ChartConfig {
            span: Duration::from_secs(30),
            buckets: 4,
        };
        let f = fixture(chart).await;
        let q = &f.queue;

        // Enqueued at 5s, claimed at 15s, acked at 25s. Samples fall on 0, 10, 20 and 30s.
        f.clock.advance(Duration::from_secs(5));
        let id = f.jobs.enqueue(q, json!({}), Duration::from_secs(60), 0).await.unwrap();
        f.clock.advance(Duration::from_secs(10));
        f.scheduler.dequeue(q).await.unwrap();
        f.clock.advance(Duration::from_secs(10));
        f.jobs.ack(q, id).await.unwrap();
        f.clock.advance(Duration::from_secs(5));

        let points = f.metrics.get_jobs_chart(q).await.unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[3].timestamp, f.clock.now());
        assert_eq!(points[0].timestamp, f.clock.now() - TimeDelta::seconds(30));

        assert_eq!(points[0].counts.total(), 0);
        assert_eq!(points[1].counts.pending_count, 1);
        assert_eq!(points[2].counts.active_count, 1);
        assert_eq!(points[3].counts.completed_count, 1);
    }

    #[test]
    fn test_single_bucket_chart() {
        let now = testing::start();
        let chart = ChartConfig {
            span: Duration::from_secs(3600),
            buckets: 1,
        };
        assert_eq!(chart_points(now, &chart), vec![now]);
    }
}
