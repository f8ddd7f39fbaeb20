//! PostgreSQL job store.
//!
//! Claims and sweeps lock candidate rows with `FOR UPDATE SKIP LOCKED`, so concurrent
//! consumers and reapers never wait on each other and never touch the same row twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgjq_core::{
    ClaimSpec, Eligibility, Job, JobFilter, JobId, JobPage, JobStatus, JobStore, JobTimeline,
    NewJob, OrderBy, QueueName, QueueStats, QueueSummary, ReclaimPolicy, Result, StatusCounts,
    SweepReport, Transition,
};
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::{DbError, DbResult};

const JOB_COLUMNS: &str = r#"
    job_id, payload, headers, priority, stale_after_ms, read_ct, status::text AS status,
    enqueued_at, dequeued_at, staled_at, completed_at, failed_at, cancelled_at
"#;

/// Window-expired predicate over alias `j`, with `$2` bound to "now".
const EXPIRED: &str = "j.dequeued_at + j.stale_after_ms * INTERVAL '1 millisecond' <= $2";

/// A job row as selected with `JOB_COLUMNS`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRow {
    job_id: i64,
    payload: serde_json::Value,
    headers: Option<serde_json::Value>,
    priority: i32,
    stale_after_ms: i64,
    read_ct: i32,
    status: String,
    enqueued_at: DateTime<Utc>,
    dequeued_at: Option<DateTime<Utc>>,
    staled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> DbResult<Self> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|_| DbError::Corrupt(format!("job {} has status {}", row.job_id, row.status)))?;
        let stale_after_ms = u64::try_from(row.stale_after_ms).map_err(|_| {
            DbError::Corrupt(format!(
                "job {} has stale_after_ms {}",
                row.job_id, row.stale_after_ms
            ))
        })?;

        Ok(Job {
            job_id: JobId::new(row.job_id),
            payload: row.payload,
            headers: row.headers,
            priority: row.priority,
            stale_after: Duration::from_millis(stale_after_ms),
            read_ct: row.read_ct,
            status,
            enqueued_at: row.enqueued_at,
            dequeued_at: row.dequeued_at,
            staled_at: row.staled_at,
            completed_at: row.completed_at,
            failed_at: row.failed_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    queue_name: String,
    created_at: DateTime<Utc>,
    job_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    pending_count: i64,
    active_count: i64,
    completed_count: i64,
    failed_count: i64,
    cancelled_count: i64,
    staled_count: i64,
    visible_count: i64,
    oldest_pending_at: Option<DateTime<Utc>>,
    newest_pending_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct TimelineRow {
    enqueued_at: DateTime<Utc>,
    dequeued_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    staled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct SweptRow {
    job_id: i64,
    status: String,
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn order_clause(order: &[OrderBy]) -> String {
    if order.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = order
        .iter()
        .map(|term| format!("j.{} {}", term.key.as_str(), term.dir.as_sql()))
        .collect();
    format!("ORDER BY {}", terms.join(", "))
}

fn eligibility_clause(eligibility: Eligibility) -> String {
    match eligibility {
        Eligibility::Pending => "j.status = 'pending'".to_string(),
        Eligibility::PendingOrExpired => {
            format!("(j.status = 'pending' OR (j.status = 'active' AND {}))", EXPIRED)
        }
    }
}

/// Lifecycle column stamped by a transition into `status`.
fn stamp_clause(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending | JobStatus::Active => "dequeued_at = $4",
        JobStatus::Completed => "completed_at = $4",
        JobStatus::Failed => "failed_at = $4",
        JobStatus::Cancelled => "cancelled_at = $4",
        JobStatus::Stale => "staled_at = $4",
    }
}

/// PostgreSQL implementation of JobStore.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, queue: &QueueName) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pgjq_queues WHERE queue_name = $1)",
        )
        .bind(queue.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn require_queue(&self, queue: &QueueName) -> DbResult<()> {
        if self.exists(queue).await? {
            Ok(())
        } else {
            Err(DbError::QueueNotFound(queue.to_string()))
        }
    }

    async fn create(&self, queue: &QueueName, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO pgjq_queues (queue_name, created_at)
            VALUES ($1, $2)
            ON CONFLICT (queue_name) DO NOTHING
            "#,
        )
        .bind(queue.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Duplicate(format!("queue {}", queue)));
        }
        Ok(())
    }

    async fn remove_queue(&self, queue: &QueueName) -> DbResult<bool> {
        // Jobs go with the queue through ON DELETE CASCADE in the same statement.
        let result = sqlx::query("DELETE FROM pgjq_queues WHERE queue_name = $1")
            .bind(queue.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> DbResult<Vec<QueueSummary>> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT q.queue_name, q.created_at, COUNT(j.job_id) AS job_count
            FROM pgjq_queues q
            LEFT JOIN pgjq_jobs j ON j.queue_name = q.queue_name
            GROUP BY q.queue_name, q.created_at
            ORDER BY q.queue_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| QueueSummary {
                name: row.queue_name,
                job_count: to_count(row.job_count),
                created_at: row.created_at,
            })
            .collect())
    }

    async fn insert(&self, queue: &QueueName, job: NewJob, now: DateTime<Utc>) -> DbResult<JobId> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO pgjq_jobs (queue_name, payload, headers, priority, stale_after_ms, enqueued_at)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (SELECT 1 FROM pgjq_queues WHERE queue_name = $1)
            RETURNING job_id
            "#,
        )
        .bind(queue.as_str())
        .bind(&job.payload)
        .bind(&job.headers)
        .bind(job.priority)
        .bind(millis(job.stale_after))
        .bind(now)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(id)) => Ok(JobId::new(id)),
            Ok(None) => Err(DbError::QueueNotFound(queue.to_string())),
            // The queue was dropped between the existence check and the insert.
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(DbError::QueueNotFound(queue.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_next(&self, queue: &QueueName, spec: &ClaimSpec) -> DbResult<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE pgjq_jobs
            SET status = 'active',
                dequeued_at = $2,
                read_ct = read_ct + 1,
                stale_after_ms = COALESCE($3, stale_after_ms)
            WHERE queue_name = $1 AND job_id = (
                SELECT j.job_id FROM pgjq_jobs j
                WHERE j.queue_name = $1 AND {eligible}
                {order}
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {columns}
            "#,
            eligible = eligibility_clause(spec.eligibility),
            order = order_clause(&spec.order),
            columns = JOB_COLUMNS,
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(queue.as_str())
            .bind(spec.now)
            .bind(spec.stale_after.map(millis))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_into()?)),
            None => {
                self.require_queue(queue).await?;
                Ok(None)
            }
        }
    }

    async fn apply_transition(
        &self,
        queue: &QueueName,
        job_id: JobId,
        transition: &Transition,
    ) -> DbResult<bool> {
        let sql = format!(
            r#"
            UPDATE pgjq_jobs
            SET status = $3::pgjq_job_status, {stamp}
            WHERE queue_name = $1 AND job_id = $2 AND status::text = ANY($5)
            "#,
            stamp = stamp_clause(transition.to),
        );
        let from: Vec<String> = transition
            .from
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let mut query = sqlx::query(&sql)
            .bind(queue.as_str())
            .bind(job_id.get())
            .bind(transition.to.as_str());
        // Requeueing clears the claim timestamp.
        query = if transition.to == JobStatus::Pending {
            query.bind(Option::<DateTime<Utc>>::None)
        } else {
            query.bind(transition.at)
        };
        let result = query.bind(from).execute(&self.pool).await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        self.require_queue(queue).await?;
        Ok(false)
    }

    async fn sweep(
        &self,
        queue: &QueueName,
        now: DateTime<Utc>,
        policy: &ReclaimPolicy,
    ) -> DbResult<SweepReport> {
        self.require_queue(queue).await?;

        let sql = format!(
            r#"
            WITH expired AS (
                SELECT j.job_id, j.read_ct FROM pgjq_jobs j
                WHERE j.queue_name = $1 AND j.status = 'active' AND {expired}
                FOR UPDATE SKIP LOCKED
            )
            UPDATE pgjq_jobs AS t
            SET status = CASE WHEN $3::int IS NOT NULL AND e.read_ct >= $3::int
                              THEN 'stale'::pgjq_job_status
                              ELSE 'pending'::pgjq_job_status END,
                staled_at = CASE WHEN $3::int IS NOT NULL AND e.read_ct >= $3::int
                                 THEN $2 ELSE t.staled_at END,
                dequeued_at = CASE WHEN $3::int IS NOT NULL AND e.read_ct >= $3::int
                                   THEN t.dequeued_at ELSE NULL END
            FROM expired e
            WHERE t.queue_name = $1 AND t.job_id = e.job_id
            RETURNING t.job_id, t.status::text AS status
            "#,
            expired = EXPIRED,
        );

        let mut rows = sqlx::query_as::<_, SweptRow>(&sql)
            .bind(queue.as_str())
            .bind(now)
            .bind(policy.max_reads)
            .fetch_all(&self.pool)
            .await?;
        rows.sort_by_key(|row| row.job_id);

        let mut report = SweepReport::default();
        for row in rows {
            let status: JobStatus = row.status.parse().map_err(|_| {
                DbError::Corrupt(format!("job {} has status {}", row.job_id, row.status))
            })?;
            report.record(JobId::new(row.job_id), status);
        }
        Ok(report)
    }

    async fn delete(&self, queue: &QueueName, job_id: JobId) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM pgjq_jobs WHERE queue_name = $1 AND job_id = $2")
            .bind(queue.as_str())
            .bind(job_id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        self.require_queue(queue).await?;
        Ok(false)
    }

    async fn purge_all(&self, queue: &QueueName) -> DbResult<u64> {
        self.require_queue(queue).await?;
        let result = sqlx::query("DELETE FROM pgjq_jobs WHERE queue_name = $1")
            .bind(queue.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, queue: &QueueName, job_id: JobId) -> DbResult<Option<Job>> {
        let sql = format!(
            "SELECT {} FROM pgjq_jobs WHERE queue_name = $1 AND job_id = $2",
            JOB_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(queue.as_str())
            .bind(job_id.get())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_into()?)),
            None => {
                self.require_queue(queue).await?;
                Ok(None)
            }
        }
    }

    /// Count and page inside one read-only REPEATABLE READ transaction, so concurrent
    /// writes cannot make the total disagree with the rows.
    async fn page(
        &self,
        queue: &QueueName,
        filter: &JobFilter,
        order: &[OrderBy],
        offset: u64,
        limit: u64,
    ) -> DbResult<JobPage> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pgjq_queues WHERE queue_name = $1)",
        )
        .bind(queue.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(DbError::QueueNotFound(queue.to_string()));
        }

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM pgjq_jobs j
            WHERE j.queue_name = $1 AND ($2::text[] IS NULL OR j.status::text = ANY($2))
            "#,
        )
        .bind(queue.as_str())
        .bind(filter.status_names())
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            r#"
            SELECT {columns} FROM pgjq_jobs j
            WHERE j.queue_name = $1 AND ($2::text[] IS NULL OR j.status::text = ANY($2))
            {order}
            OFFSET $3 LIMIT $4
            "#,
            columns = JOB_COLUMNS,
            order = order_clause(order),
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(queue.as_str())
            .bind(filter.status_names())
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(JobPage {
            total_count: to_count(total),
            jobs: rows
                .into_iter()
                .map(Job::try_from)
                .collect::<DbResult<Vec<_>>>()?,
        })
    }

    async fn stats(&self, queue: &QueueName, now: DateTime<Utc>) -> DbResult<QueueStats> {
        self.require_queue(queue).await?;

        let sql = format!(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE j.status = 'pending') AS pending_count,
                COUNT(*) FILTER (WHERE j.status = 'active') AS active_count,
                COUNT(*) FILTER (WHERE j.status = 'completed') AS completed_count,
                COUNT(*) FILTER (WHERE j.status = 'failed') AS failed_count,
                COUNT(*) FILTER (WHERE j.status = 'cancelled') AS cancelled_count,
                COUNT(*) FILTER (WHERE j.status = 'stale') AS staled_count,
                COUNT(*) FILTER (
                    WHERE j.status = 'pending' OR (j.status = 'active' AND {expired})
                ) AS visible_count,
                MIN(j.enqueued_at) FILTER (WHERE j.status = 'pending') AS oldest_pending_at,
                MAX(j.enqueued_at) FILTER (WHERE j.status = 'pending') AS newest_pending_at
            FROM pgjq_jobs j
            WHERE j.queue_name = $1
            "#,
            expired = EXPIRED,
        );

        let row = sqlx::query_as::<_, StatsRow>(&sql)
            .bind(queue.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(QueueStats {
            counts: StatusCounts {
                pending_count: to_count(row.pending_count),
                active_count: to_count(row.active_count),
                completed_count: to_count(row.completed_count),
                failed_count: to_count(row.failed_count),
                cancelled_count: to_count(row.cancelled_count),
                staled_count: to_count(row.staled_count),
            },
            visible_count: to_count(row.visible_count),
            oldest_pending_at: row.oldest_pending_at,
            newest_pending_at: row.newest_pending_at,
        })
    }

    async fn job_timelines(&self, queue: &QueueName) -> DbResult<Vec<JobTimeline>> {
        self.require_queue(queue).await?;

        let rows = sqlx::query_as::<_, TimelineRow>(
            r#"
            SELECT enqueued_at, dequeued_at, completed_at, failed_at, cancelled_at, staled_at
            FROM pgjq_jobs
            WHERE queue_name = $1
            ORDER BY job_id
            "#,
        )
        .bind(queue.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| JobTimeline {
                enqueued_at: row.enqueued_at,
                dequeued_at: row.dequeued_at,
                completed_at: row.completed_at,
                failed_at: row.failed_at,
                cancelled_at: row.cancelled_at,
                staled_at: row.staled_at,
            })
            .collect())
    }

    async fn select_one(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn create_queue(&self, queue: &QueueName, now: DateTime<Utc>) -> Result<()> {
        Ok(self.create(queue, now).await?)
    }

    async fn drop_queue(&self, queue: &QueueName) -> Result<bool> {
        Ok(self.remove_queue(queue).await?)
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool> {
        Ok(self.exists(queue).await?)
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        Ok(self.list().await?)
    }

    async fn insert_job(
        &self,
        queue: &QueueName,
        job: NewJob,
        now: DateTime<Utc>,
    ) -> Result<JobId> {
        Ok(self.insert(queue, job, now).await?)
    }

    async fn claim(&self, queue: &QueueName, spec: &ClaimSpec) -> Result<Option<Job>> {
        Ok(self.claim_next(queue, spec).await?)
    }

    async fn transition(
        &self,
        queue: &QueueName,
        job_id: JobId,
        transition: &Transition,
    ) -> Result<bool> {
        Ok(self.apply_transition(queue, job_id, transition).await?)
    }

    async fn reclaim_expired(
        &self,
        queue: &QueueName,
        now: DateTime<Utc>,
        policy: &ReclaimPolicy,
    ) -> Result<SweepReport> {
        Ok(self.sweep(queue, now, policy).await?)
    }

    async fn delete_job(&self, queue: &QueueName, job_id: JobId) -> Result<bool> {
        Ok(self.delete(queue, job_id).await?)
    }

    async fn purge(&self, queue: &QueueName) -> Result<u64> {
        Ok(self.purge_all(queue).await?)
    }

    async fn get_job(&self, queue: &QueueName, job_id: JobId) -> Result<Option<Job>> {
        Ok(self.get(queue, job_id).await?)
    }

    async fn find_page(
        &self,
        queue: &QueueName,
        filter: &JobFilter,
        order: &[OrderBy],
        offset: u64,
        limit: u64,
    ) -> Result<JobPage> {
        Ok(self.page(queue, filter, order, offset, limit).await?)
    }

    async fn queue_stats(&self, queue: &QueueName, now: DateTime<Utc>) -> Result<QueueStats> {
        Ok(self.stats(queue, now).await?)
    }

    async fn timelines(&self, queue: &QueueName) -> Result<Vec<JobTimeline>> {
        Ok(self.job_timelines(queue).await?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.select_one().await?)
    }

    async fn close(&self) {
        info!("Closing PostgreSQL pool");
        self.pool.close().await;
    }
}

/// Integration tests that require PostgreSQL.
/// Run with: DATABASE_URL=postgres://... cargo test -p pgjq-db -- --ignored
#[cfg(test)]
mod integration_tests {
    use super::*;
    use chrono::TimeDelta;
    use pgjq_config::DatabaseConfig;
    use serde_json::json;

    async fn store() -> PgJobStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = crate::create_pool(&url, &DatabaseConfig::default())
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        PgJobStore::new(pool)
    }

    async fn fresh_queue(store: &PgJobStore, name: &str) -> QueueName {
        let queue = QueueName::new(name).unwrap();
        store.drop_queue(&queue).await.unwrap();
        store.create_queue(&queue, Utc::now()).await.unwrap();
        queue
    }

    #[tokio::test]
    #[ignore]
    async fn test_claim_order_and_ack() {
        let store = store().await;
        let queue = fresh_queue(&store, "it_claim_order").await;
        let now = Utc::now();

        let low = store
            .insert_job(&queue, NewJob::new(json!({"n": 1}), Duration::from_secs(60)), now)
            .await
            .unwrap();
        let high = store
            .insert_job(
                &queue,
                NewJob::new(json!({"n": 2}), Duration::from_secs(60)).with_priority(5),
                now,
            )
            .await
            .unwrap();

        let first = store.claim(&queue, &ClaimSpec::new(now)).await.unwrap().unwrap();
        assert_eq!(first.job_id, high);
        assert_eq!(first.read_ct, 1);

        let second = store.claim(&queue, &ClaimSpec::new(now)).await.unwrap().unwrap();
        assert_eq!(second.job_id, low);
        assert!(store.claim(&queue, &ClaimSpec::new(now)).await.unwrap().is_none());

        assert!(store.transition(&queue, high, &Transition::ack(now)).await.unwrap());
        assert!(!store.transition(&queue, high, &Transition::ack(now)).await.unwrap());

        store.drop_queue(&queue).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_sweep_requeues_expired() {
        let store = store().await;
        let queue = fresh_queue(&store, "it_sweep").await;
        let now = Utc::now();

        let id = store
            .insert_job(&queue, NewJob::new(json!({}), Duration::from_secs(1)), now)
            .await
            .unwrap();
        store.claim(&queue, &ClaimSpec::new(now)).await.unwrap().unwrap();

        let later = now + TimeDelta::seconds(2);
        let report = store
            .reclaim_expired(&queue, later, &ReclaimPolicy::requeue_always())
            .await
            .unwrap();
        assert_eq!(report.requeued, vec![id]);

        let again = store.claim(&queue, &ClaimSpec::new(later)).await.unwrap().unwrap();
        assert_eq!(again.job_id, id);
        assert_eq!(again.read_ct, 2);

        store.drop_queue(&queue).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_missing_queue() {
        let store = store().await;
        let queue = QueueName::new("it_never_created").unwrap();
        store.drop_queue(&queue).await.unwrap();

        let err = store
            .insert_job(&queue, NewJob::new(json!({}), Duration::from_secs(1)), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, pgjq_core::Error::QueueNotFound(_)));

        let err = store
            .find_page(&queue, &JobFilter::all(), &[], 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, pgjq_core::Error::QueueNotFound(_)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_find_page_counts_all_matches() {
        let store = store().await;
        let queue = fresh_queue(&store, "it_find_page").await;
        let now = Utc::now();

        for n in 0..5 {
            store
                .insert_job(&queue, NewJob::new(json!({"n": n}), Duration::from_secs(60)), now)
                .await
                .unwrap();
        }
        store.claim(&queue, &ClaimSpec::new(now)).await.unwrap().unwrap();

        let pending = JobFilter::statuses([JobStatus::Pending]);
        let order = [OrderBy::new(pgjq_core::SortBy::JobId, pgjq_core::SortDir::Asc)];
        let page = store.find_page(&queue, &pending, &order, 1, 2).await.unwrap();
        assert_eq!(page.total_count, 4);
        assert_eq!(page.jobs.len(), 2);
        assert!(page.jobs.iter().all(|job| job.status == JobStatus::Pending));
        assert!(page.jobs[0].job_id < page.jobs[1].job_id);

        store.drop_queue(&queue).await.unwrap();
    }
}
