//! Database models for the evaluation API.
//!
//! These are the row types returned by SQLx queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    App, EvaluationRecord, EvaluationScenario, EvaluatorConfig, ProjectMember, QueuedJob, Testset,
    Variant,
};
use crate::error::ApiError;

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|e| ApiError::Internal(format!("Invalid stored id: {}", e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::Internal(format!("Invalid stored timestamp: {}", e)))
}

/// Database row for apps table.
#[derive(Debug, Clone, FromRow)]
pub struct AppRow {
    pub id: String,
    pub project_id: String,
    pub app_name: String,
    pub modified_by_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<AppRow> for App {
    type Error = ApiError;

    fn try_from(row: AppRow) -> Result<Self, Self::Error> {
        Ok(App {
            id: parse_uuid(&row.id)?,
            project_id: row.project_id,
            app_name: row.app_name,
            modified_by_id: row.modified_by_id,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Database row for variants table.
#[derive(Debug, Clone, FromRow)]
pub struct VariantRow {
    pub id: String,
    pub app_id: String,
    pub project_id: String,
    pub variant_name: String,
    pub input_names: String,
    pub revision: i64,
}

impl TryFrom<VariantRow> for Variant {
    type Error = ApiError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        Ok(Variant {
            id: parse_uuid(&row.id)?,
            app_id: parse_uuid(&row.app_id)?,
            project_id: row.project_id,
            variant_name: row.variant_name,
            input_names: serde_json::from_str(&row.input_names)?,
            revision: row.revision,
        })
    }
}

/// Database row for testsets table.
#[derive(Debug, Clone, FromRow)]
pub struct TestsetRow {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub csvdata: String,
}

impl TryFrom<TestsetRow> for Testset {
    type Error = ApiError;

    fn try_from(row: TestsetRow) -> Result<Self, Self::Error> {
        Ok(Testset {
            id: parse_uuid(&row.id)?,
            project_id: row.project_id,
            name: row.name,
            csvdata: serde_json::from_str(&row.csvdata)?,
        })
    }
}

/// Database row for evaluator_configs table.
#[derive(Debug, Clone, FromRow)]
pub struct EvaluatorConfigRow {
    pub id: String,
    pub project_id: String,
    pub app_id: Option<String>,
    pub name: String,
    pub evaluator_key: String,
    pub settings_values: String,
}

impl TryFrom<EvaluatorConfigRow> for EvaluatorConfig {
    type Error = ApiError;

    fn try_from(row: EvaluatorConfigRow) -> Result<Self, Self::Error> {
        Ok(EvaluatorConfig {
            id: parse_uuid(&row.id)?,
            project_id: row.project_id,
            app_id: row.app_id.as_deref().map(parse_uuid).transpose()?,
            name: row.name,
            evaluator_key: row.evaluator_key,
            settings_values: serde_json::from_str(&row.settings_values)?,
        })
    }
}

/// Database row for evaluations table.
#[derive(Debug, Clone, FromRow)]
pub struct EvaluationRow {
    pub id: String,
    pub app_id: String,
    pub project_id: String,
    pub variant_id: String,
    pub variant_name: String,
    pub testset_id: String,
    pub testset_name: String,
    pub status: String,
    pub evaluators_configs: String,
    pub aggregated_results: String,
    pub average_latency: Option<f64>,
    pub average_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<EvaluationRow> for EvaluationRecord {
    type Error = ApiError;

    fn try_from(row: EvaluationRow) -> Result<Self, Self::Error> {
        Ok(EvaluationRecord {
            id: parse_uuid(&row.id)?,
            app_id: parse_uuid(&row.app_id)?,
            project_id: row.project_id,
            variant_id: parse_uuid(&row.variant_id)?,
            variant_name: row.variant_name,
            testset_id: parse_uuid(&row.testset_id)?,
            testset_name: row.testset_name,
            status: row.status.parse().map_err(ApiError::Internal)?,
            evaluators_configs: serde_json::from_str(&row.evaluators_configs)?,
            aggregated_results: serde_json::from_str(&row.aggregated_results)?,
            average_latency: row.average_latency,
            average_cost: row.average_cost,
            total_cost: row.total_cost,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Database row for evaluation_scenarios table.
#[derive(Debug, Clone, FromRow)]
pub struct EvaluationScenarioRow {
    pub id: String,
    pub evaluation_id: String,
    pub inputs: String,
    pub outputs: String,
    pub correct_answers: String,
    pub is_pinned: bool,
    pub note: Option<String>,
    pub results: String,
}

impl TryFrom<EvaluationScenarioRow> for EvaluationScenario {
    type Error = ApiError;

    fn try_from(row: EvaluationScenarioRow) -> Result<Self, Self::Error> {
        Ok(EvaluationScenario {
            id: parse_uuid(&row.id)?,
            evaluation_id: parse_uuid(&row.evaluation_id)?,
            inputs: serde_json::from_str(&row.inputs)?,
            outputs: serde_json::from_str(&row.outputs)?,
            correct_answers: serde_json::from_str(&row.correct_answers)?,
            is_pinned: row.is_pinned,
            note: row.note,
            results: serde_json::from_str(&row.results)?,
        })
    }
}

/// Database row for project_members table.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectMemberRow {
    pub project_id: String,
    pub user_id: String,
    pub role: String,
}

impl TryFrom<ProjectMemberRow> for ProjectMember {
    type Error = ApiError;

    fn try_from(row: ProjectMemberRow) -> Result<Self, Self::Error> {
        Ok(ProjectMember {
            project_id: row.project_id,
            user_id: row.user_id,
            role: row.role.parse().map_err(ApiError::Internal)?,
        })
    }
}

/// Database row for job_queue table.
#[derive(Debug, Clone, FromRow)]
pub struct QueuedJobRow {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub enqueued_at: String,
}

impl TryFrom<QueuedJobRow> for QueuedJob {
    type Error = ApiError;

    fn try_from(row: QueuedJobRow) -> Result<Self, Self::Error> {
        Ok(QueuedJob {
            message_id: row.id,
            queue_name: row.queue_name,
            job: serde_json::from_str(&row.payload)?,
            enqueued_at: parse_timestamp(&row.enqueued_at)?,
        })
    }
}
