//! Evaluation scenario types: one testset row run through one variant.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::ResultValue;

/// A named input the variant received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScenarioInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

/// What the variant produced for the inputs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScenarioOutput {
    pub result: ResultValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
}

/// Expected answer taken from a testset column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CorrectAnswer {
    pub key: String,
    pub value: String,
}

/// Scenario score returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScenarioResult {
    pub evaluator_config: Uuid,
    pub result: ResultValue,
}

/// One row-level record within an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluationScenario {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub inputs: Vec<ScenarioInput>,
    pub outputs: Vec<ScenarioOutput>,
    #[serde(default)]
    pub correct_answers: Vec<CorrectAnswer>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub results: Vec<ScenarioResult>,
}

/// An evaluation taking part in a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparedEvaluation {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub variant_name: String,
    pub testset_id: Uuid,
}

/// One evaluation's output and scores for a comparison row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparisonCell {
    pub evaluation_id: Uuid,
    pub variant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ScenarioOutput>,
    pub results: Vec<ScenarioResult>,
}

/// Scenarios sharing the same inputs, side by side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparisonRow {
    pub inputs: Vec<ScenarioInput>,
    pub correct_answers: Vec<CorrectAnswer>,
    pub variants: Vec<ComparisonCell>,
}

/// Scenario comparison across several evaluations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparisonResult {
    pub evaluations: Vec<ComparedEvaluation>,
    pub rows: Vec<ComparisonRow>,
}
