//! API request and response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{AggregatedResult, EvaluationStatus, LlmRunRateLimit, ResourceType};
use crate::error::{ApiError, ApiResult};

// ==================== Create ====================

/// Request to evaluate one or more variants of an app against a testset.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewEvaluation {
    pub app_id: Uuid,
    /// One evaluation is created per variant, in this order.
    pub variant_ids: Vec<Uuid>,
    /// Evaluator configs to score each scenario with.
    pub evaluators_configs: Vec<Uuid>,
    pub testset_id: Uuid,
    #[serde(default)]
    pub rate_limit: LlmRunRateLimit,
    /// Provider name to API key, e.g. `OPENAI_API_KEY`.
    #[serde(default)]
    pub lm_providers_keys: Option<HashMap<String, String>>,
    /// Testset column holding the expected answer.
    #[serde(default)]
    pub correct_answer_column: Option<String>,
}

// ==================== Delete ====================

/// Request to delete evaluations.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteEvaluation {
    pub evaluations_ids: Vec<String>,
}

// ==================== Queries ====================

/// Query for `GET /evaluations/by_resource/`.
///
/// `resource_ids` may repeat, so this is built from the raw query pairs.
#[derive(Debug)]
pub struct ByResourceQuery {
    pub app_id: Option<String>,
    pub resource_type: ResourceType,
    pub resource_ids: Vec<String>,
}

impl ByResourceQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> ApiResult<Self> {
        let mut app_id = None;
        let mut resource_type = None;
        let mut resource_ids = Vec::new();

        for (key, value) in pairs {
            match key.as_str() {
                "app_id" => app_id = Some(value),
                "resource_type" => resource_type = Some(value),
                "resource_ids" => resource_ids.push(value),
                _ => {}
            }
        }

        let resource_type = resource_type
            .ok_or_else(|| ApiError::BadRequest("resource_type is required".to_string()))?
            .parse::<ResourceType>()
            .map_err(ApiError::Internal)?;

        Ok(Self {
            app_id,
            resource_type,
            resource_ids,
        })
    }
}

/// Query for listing the evaluations of an app.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListEvaluationsQuery {
    pub app_id: Uuid,
}

/// Query for comparing evaluations.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ComparisonQuery {
    /// Comma-separated evaluation ids.
    pub evaluations_ids: String,
}

impl ComparisonQuery {
    /// The ids in order, trimmed, with empty parts dropped.
    pub fn ids(&self) -> Vec<&str> {
        self.evaluations_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    }
}

// ==================== Responses ====================

/// Status of an evaluation.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: EvaluationStatus,
}

/// Aggregated results of an evaluation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultsResponse {
    pub results: Vec<AggregatedResult>,
    pub evaluation_id: Uuid,
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Database connectivity.
    pub database: String,
    pub timestamp: String,
}

/// Parse an id taken from a path or payload.
pub fn parse_evaluation_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid evaluation id: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_by_resource_collects_repeated_ids() {
        let query = ByResourceQuery::from_pairs(pairs(&[
            ("app_id", "app-1"),
            ("resource_type", "testset"),
            ("resource_ids", "a"),
            ("resource_ids", "b"),
        ]))
        .unwrap();

        assert_eq!(query.resource_type, ResourceType::Testset);
        assert_eq!(query.resource_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(query.app_id.as_deref(), Some("app-1"));
    }

    #[test]
    fn test_by_resource_rejects_unknown_type() {
        let err = ByResourceQuery::from_pairs(pairs(&[("resource_type", "dataset")])).unwrap_err();
        assert!(matches!(err, ApiError::Internal(ref msg) if msg.contains("dataset")));

        let err = ByResourceQuery::from_pairs(Vec::new()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_comparison_ids_are_trimmed() {
        let query = ComparisonQuery {
            evaluations_ids: " a, b,,c ,".to_string(),
        };
        assert_eq!(query.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_new_evaluation_defaults() {
        let payload: NewEvaluation = serde_json::from_value(serde_json::json!({
            "app_id": Uuid::new_v4(),
            "variant_ids": [Uuid::new_v4()],
            "evaluators_configs": [],
            "testset_id": Uuid::new_v4(),
        }))
        .unwrap();

        assert_eq!(payload.rate_limit, LlmRunRateLimit::default());
        assert!(payload.lm_providers_keys.is_none());
        assert!(payload.correct_answer_column.is_none());
    }
}
