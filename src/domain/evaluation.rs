//! Evaluation domain types.
//!
//! An evaluation runs one variant of an app against a testset with a set of
//! evaluator configs. The worker owns its lifecycle after creation; this
//! service only creates, reads and deletes the records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::EvaluatorConfig;

/// Lifecycle status of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    EvaluationInitialized,
    EvaluationStarted,
    EvaluationFinished,
    EvaluationFinishedWithErrors,
    EvaluationFailed,
    EvaluationAggregationFailed,
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvaluationStatus::EvaluationInitialized => "EVALUATION_INITIALIZED",
            EvaluationStatus::EvaluationStarted => "EVALUATION_STARTED",
            EvaluationStatus::EvaluationFinished => "EVALUATION_FINISHED",
            EvaluationStatus::EvaluationFinishedWithErrors => "EVALUATION_FINISHED_WITH_ERRORS",
            EvaluationStatus::EvaluationFailed => "EVALUATION_FAILED",
            EvaluationStatus::EvaluationAggregationFailed => "EVALUATION_AGGREGATION_FAILED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for EvaluationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EVALUATION_INITIALIZED" => Ok(EvaluationStatus::EvaluationInitialized),
            "EVALUATION_STARTED" => Ok(EvaluationStatus::EvaluationStarted),
            "EVALUATION_FINISHED" => Ok(EvaluationStatus::EvaluationFinished),
            "EVALUATION_FINISHED_WITH_ERRORS" => Ok(EvaluationStatus::EvaluationFinishedWithErrors),
            "EVALUATION_FAILED" => Ok(EvaluationStatus::EvaluationFailed),
            "EVALUATION_AGGREGATION_FAILED" => Ok(EvaluationStatus::EvaluationAggregationFailed),
            _ => Err(format!("Unknown evaluation status: {}", s)),
        }
    }
}

/// Resource an evaluation can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Testset,
    EvaluatorConfig,
    Variant,
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testset" => Ok(ResourceType::Testset),
            "evaluator_config" => Ok(ResourceType::EvaluatorConfig),
            "variant" => Ok(ResourceType::Variant),
            _ => Err(format!("resource_type {} is not supported", s)),
        }
    }
}

/// Error attached to a result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

/// A typed score or output produced by an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultValue {
    /// Value kind, e.g. `number`, `bool`, `text`, `error`.
    #[serde(rename = "type")]
    pub kind: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
}

/// Aggregated result as stored: keyed by evaluator config id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAggregatedResult {
    pub evaluator_config_id: Uuid,
    pub result: ResultValue,
}

/// Aggregated result as returned to clients, with its evaluator config embedded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AggregatedResult {
    pub evaluator_config: EvaluatorConfig,
    pub result: ResultValue,
}

/// An evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Evaluation {
    pub id: Uuid,
    pub app_id: Uuid,
    pub project_id: String,
    pub variant_ids: Vec<Uuid>,
    pub variant_names: Vec<String>,
    pub testset_id: Uuid,
    pub testset_name: String,
    pub status: EvaluationStatus,
    pub evaluators_configs: Vec<Uuid>,
    pub aggregated_results: Vec<AggregatedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_latency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored form of an evaluation before evaluator configs are joined in.
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    pub id: Uuid,
    pub app_id: Uuid,
    pub project_id: String,
    pub variant_id: Uuid,
    pub variant_name: String,
    pub testset_id: Uuid,
    pub testset_name: String,
    pub status: EvaluationStatus,
    pub evaluators_configs: Vec<Uuid>,
    pub aggregated_results: Vec<StoredAggregatedResult>,
    pub average_latency: Option<f64>,
    pub average_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    /// A freshly created evaluation waiting for the worker to pick it up.
    pub fn initialized(
        project_id: &str,
        app_id: Uuid,
        variant_id: Uuid,
        variant_name: String,
        testset_id: Uuid,
        testset_name: String,
        evaluators_configs: Vec<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            app_id,
            project_id: project_id.to_string(),
            variant_id,
            variant_name,
            testset_id,
            testset_name,
            status: EvaluationStatus::EvaluationInitialized,
            evaluators_configs,
            aggregated_results: Vec::new(),
            average_latency: None,
            average_cost: None,
            total_cost: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Render for clients with already resolved aggregated results.
    pub fn into_evaluation(self, aggregated_results: Vec<AggregatedResult>) -> Evaluation {
        Evaluation {
            id: self.id,
            app_id: self.app_id,
            project_id: self.project_id,
            variant_ids: vec![self.variant_id],
            variant_names: vec![self.variant_name],
            testset_id: self.testset_id,
            testset_name: self.testset_name,
            status: self.status,
            evaluators_configs: self.evaluators_configs,
            aggregated_results,
            average_latency: self.average_latency,
            average_cost: self.average_cost,
            total_cost: self.total_cost,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&EvaluationStatus::EvaluationFinishedWithErrors).unwrap();
        assert_eq!(json, "\"EVALUATION_FINISHED_WITH_ERRORS\"");

        let status: EvaluationStatus = "evaluation_started".parse().unwrap();
        assert_eq!(status, EvaluationStatus::EvaluationStarted);
        assert_eq!(status.to_string(), "EVALUATION_STARTED");
        assert!("RUNNING".parse::<EvaluationStatus>().is_err());
    }

    #[test]
    fn test_resource_type_parsing() {
        assert_eq!(
            "evaluator_config".parse::<ResourceType>().unwrap(),
            ResourceType::EvaluatorConfig
        );
        let err = "app".parse::<ResourceType>().unwrap_err();
        assert_eq!(err, "resource_type app is not supported");
    }

    #[test]
    fn test_initialized_record() {
        let record = EvaluationRecord::initialized(
            "proj",
            Uuid::new_v4(),
            Uuid::new_v4(),
            "v1".to_string(),
            Uuid::new_v4(),
            "golden".to_string(),
            vec![],
        );
        assert_eq!(record.status, EvaluationStatus::EvaluationInitialized);
        assert!(record.aggregated_results.is_empty());

        let variant_id = record.variant_id;
        let evaluation = record.into_evaluation(Vec::new());
        assert_eq!(evaluation.variant_ids, vec![variant_id]);
        assert_eq!(evaluation.variant_names, vec!["v1".to_string()]);
    }
}
