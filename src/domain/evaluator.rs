//! Evaluator configs: a configured scoring method.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Evaluator key of the LLM-as-judge evaluator.
pub const AI_CRITIQUE_EVALUATOR_KEY: &str = "auto_ai_critique";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluatorConfig {
    pub id: Uuid,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<Uuid>,
    pub name: String,
    pub evaluator_key: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub settings_values: serde_json::Value,
}

impl EvaluatorConfig {
    pub fn new(project_id: &str, name: impl Into<String>, evaluator_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            app_id: None,
            name: name.into(),
            evaluator_key: evaluator_key.into(),
            settings_values: serde_json::Value::Object(Default::default()),
        }
    }

    /// Whether running this evaluator calls an LLM.
    pub fn is_ai_critique(&self) -> bool {
        self.evaluator_key == AI_CRITIQUE_EVALUATOR_KEY
    }
}
