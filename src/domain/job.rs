//! Evaluation job published to the worker queue.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Rate limits the worker applies when calling the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LlmRunRateLimit {
    pub batch_size: u32,
    pub max_retries: u32,
    /// Seconds between retries.
    pub retry_delay: u32,
    /// Seconds between batches.
    pub delay_between_batches: u32,
}

impl Default for LlmRunRateLimit {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retries: 3,
            retry_delay: 3,
            delay_between_batches: 5,
        }
    }
}

/// Everything the worker needs to run one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub app_id: Uuid,
    pub project_id: String,
    pub variant_id: Uuid,
    pub evaluators_config_ids: Vec<Uuid>,
    pub testset_id: Uuid,
    pub evaluation_id: Uuid,
    pub rate_limit_config: LlmRunRateLimit,
    #[serde(default)]
    pub lm_providers_keys: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_column: Option<String>,
}

/// A job as it sits in the queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub message_id: i64,
    pub queue_name: String,
    pub job: EvaluationJob,
    pub enqueued_at: DateTime<Utc>,
}
