//! Evaluation job queue.
//!
//! Handlers publish one [`EvaluationJob`] per created evaluation and never
//! wait for it; a separate worker consumes the queue.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;

use crate::domain::{EvaluationJob, QueuedJob};
use crate::error::{ApiError, ApiResult};
use crate::storage::QueuedJobRow;

/// Publishes evaluation jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Publish a job and return its message id.
    async fn enqueue(&self, job: &EvaluationJob) -> ApiResult<i64>;
}

/// Queue backed by a SQLite table, one row per message.
#[derive(Debug, Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
    queue_name: String,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, queue_name: impl Into<String>) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
        }
    }

    /// Create the queue table if it doesn't exist.
    pub async fn init(&self) -> ApiResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_name TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at TEXT NOT NULL,
                read_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_job_queue_pending ON job_queue(queue_name, read_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!(queue = %self.queue_name, "Job queue ready");
        Ok(())
    }

    /// Messages not yet picked up by a worker, oldest first.
    pub async fn pending_jobs(&self) -> ApiResult<Vec<QueuedJob>> {
        let rows: Vec<QueuedJobRow> = sqlx::query_as(
            r#"
            SELECT id, queue_name, payload, enqueued_at
            FROM job_queue
            WHERE queue_name = ? AND read_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(&self.queue_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QueuedJob::try_from).collect()
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &EvaluationJob) -> ApiResult<i64> {
        let payload = serde_json::to_string(job)?;

        let result = sqlx::query(
            "INSERT INTO job_queue (queue_name, payload, enqueued_at) VALUES (?, ?, ?)",
        )
        .bind(&self.queue_name)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::Queue(format!("Failed to send message to {}: {}", self.queue_name, e)))?;

        let message_id = result.last_insert_rowid();

        tracing::info!(
            queue = %self.queue_name,
            message_id,
            evaluation_id = %job.evaluation_id,
            "Evaluation job enqueued"
        );

        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LlmRunRateLimit;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;
    use uuid::Uuid;

    async fn setup_queue(name: &str) -> SqliteJobQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = SqliteJobQueue::new(pool, name);
        queue.init().await.unwrap();
        queue
    }

    fn job() -> EvaluationJob {
        EvaluationJob {
            app_id: Uuid::new_v4(),
            project_id: "proj".to_string(),
            variant_id: Uuid::new_v4(),
            evaluators_config_ids: vec![Uuid::new_v4()],
            testset_id: Uuid::new_v4(),
            evaluation_id: Uuid::new_v4(),
            rate_limit_config: LlmRunRateLimit::default(),
            lm_providers_keys: HashMap::from([("OPENAI_API_KEY".to_string(), "sk".to_string())]),
            correct_answer_column: None,
        }
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order_and_payload() {
        let queue = setup_queue("evaluations").await;
        let first = job();
        let second = job();

        let first_id = queue.enqueue(&first).await.unwrap();
        let second_id = queue.enqueue(&second).await.unwrap();
        assert!(second_id > first_id);

        let pending = queue.pending_jobs().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].job.evaluation_id, first.evaluation_id);
        assert_eq!(pending[1].job.evaluation_id, second.evaluation_id);
        assert_eq!(pending[0].queue_name, "evaluations");
        assert_eq!(
            pending[0].job.lm_providers_keys.get("OPENAI_API_KEY").map(String::as_str),
            Some("sk")
        );
    }

    #[tokio::test]
    async fn test_queues_are_isolated_by_name() {
        let queue = setup_queue("evaluations").await;
        let other = SqliteJobQueue::new(queue.pool.clone(), "priority");

        queue.enqueue(&job()).await.unwrap();

        assert_eq!(queue.pending_jobs().await.unwrap().len(), 1);
        assert!(other.pending_jobs().await.unwrap().is_empty());
    }
}
