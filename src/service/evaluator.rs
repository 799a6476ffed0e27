//! Checks on evaluator configs before an evaluation is created.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::storage::EvaluationRepository;

/// Provider key AI critique evaluators call the judge model with.
pub const OPENAI_KEY_NAME: &str = "OPENAI_API_KEY";

/// Detail returned when an AI critique evaluator has no key to run with.
pub const MISSING_OPENAI_KEY_MESSAGE: &str =
    "Missing OpenAI API key. Please provide one in lm_providers_keys.";

/// Ensure every referenced evaluator config exists and that AI critique
/// evaluators have an OpenAI key, either in the payload or configured.
pub async fn check_ai_critique_inputs(
    repository: &EvaluationRepository,
    project_id: &str,
    evaluators_configs: &[Uuid],
    lm_providers_keys: &HashMap<String, String>,
    fallback_openai_key: Option<&str>,
) -> ApiResult<()> {
    let configs = repository
        .fetch_evaluator_configs(project_id, evaluators_configs)
        .await?;

    if let Some(missing) = evaluators_configs
        .iter()
        .find(|id| !configs.iter().any(|config| config.id == **id))
    {
        return Err(ApiError::NotFound(format!(
            "Evaluator config with id {} not found",
            missing
        )));
    }

    if !configs.iter().any(|config| config.is_ai_critique()) {
        return Ok(());
    }

    let has_key = lm_providers_keys
        .get(OPENAI_KEY_NAME)
        .map(String::as_str)
        .or(fallback_openai_key)
        .is_some_and(|key| !key.trim().is_empty());

    if has_key {
        Ok(())
    } else {
        Err(ApiError::BadRequest(MISSING_OPENAI_KEY_MESSAGE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvaluatorConfig, AI_CRITIQUE_EVALUATOR_KEY};
    use crate::storage::test_support::setup_test_db;

    async fn seeded() -> (EvaluationRepository, EvaluatorConfig, EvaluatorConfig) {
        let repo = setup_test_db().await;
        let exact = EvaluatorConfig::new("proj", "Exact", "auto_exact_match");
        let critique = EvaluatorConfig::new("proj", "Critique", AI_CRITIQUE_EVALUATOR_KEY);
        repo.insert_evaluator_config(&exact).await.unwrap();
        repo.insert_evaluator_config(&critique).await.unwrap();
        (repo, exact, critique)
    }

    #[tokio::test]
    async fn test_plain_evaluators_need_no_key() {
        let (repo, exact, _) = seeded().await;
        check_ai_critique_inputs(&repo, "proj", &[exact.id], &HashMap::new(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ai_critique_requires_key() {
        let (repo, exact, critique) = seeded().await;

        let err = check_ai_critique_inputs(
            &repo,
            "proj",
            &[exact.id, critique.id],
            &HashMap::from([(OPENAI_KEY_NAME.to_string(), "  ".to_string())]),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg == MISSING_OPENAI_KEY_MESSAGE));

        let keys = HashMap::from([(OPENAI_KEY_NAME.to_string(), "sk-test".to_string())]);
        check_ai_critique_inputs(&repo, "proj", &[critique.id], &keys, None)
            .await
            .unwrap();

        check_ai_critique_inputs(&repo, "proj", &[critique.id], &HashMap::new(), Some("sk-env"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_config_is_not_found() {
        let (repo, exact, _) = seeded().await;
        let err = check_ai_critique_inputs(
            &repo,
            "proj",
            &[exact.id, Uuid::new_v4()],
            &HashMap::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
