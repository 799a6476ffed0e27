//! Evaluation service: the operations handlers delegate to.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::{
    AggregatedResult, App, ComparedEvaluation, ComparisonCell, ComparisonResult, ComparisonRow,
    Evaluation, EvaluationRecord, EvaluationScenario, EvaluatorConfig,
};
use crate::error::{ApiError, ApiResult};
use crate::storage::EvaluationRepository;

/// Detail returned when a testset cannot feed a variant.
pub const COLUMN_MISMATCH_MESSAGE: &str =
    "columns in the test set should match the names of the inputs in the variant";

/// Evaluation operations over the repository.
#[derive(Clone)]
pub struct EvaluationService {
    repository: EvaluationRepository,
}

impl EvaluationService {
    pub fn new(repository: EvaluationRepository) -> Self {
        Self { repository }
    }

    /// Create an initialized evaluation of one variant against a testset.
    ///
    /// Fails with 404 for an unknown variant or testset and with 400 when a
    /// variant input has no matching testset column.
    pub async fn create_new_evaluation(
        &self,
        project_id: &str,
        app_id: Uuid,
        variant_id: Uuid,
        testset_id: Uuid,
        evaluators_configs: &[Uuid],
    ) -> ApiResult<Evaluation> {
        let variant = self
            .repository
            .fetch_variant_by_id(project_id, variant_id)
            .await?
            .filter(|variant| variant.app_id == app_id)
            .ok_or_else(|| ApiError::NotFound(format!("Variant with id {} not found", variant_id)))?;

        let testset = self
            .repository
            .fetch_testset_by_id(project_id, testset_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Testset with id {} not found", testset_id)))?;

        if let Some(column) = testset.missing_column(&variant.input_names) {
            tracing::warn!(
                variant_id = %variant_id,
                testset_id = %testset_id,
                column,
                "Testset is missing a variant input column"
            );
            return Err(ApiError::BadRequest(COLUMN_MISMATCH_MESSAGE.to_string()));
        }

        let record = EvaluationRecord::initialized(
            project_id,
            app_id,
            variant.id,
            variant.variant_name,
            testset.id,
            testset.name,
            evaluators_configs.to_vec(),
        );
        self.repository.insert_evaluation(&record).await?;

        Ok(record.into_evaluation(Vec::new()))
    }

    /// Fetch an evaluation with its aggregated results resolved.
    pub async fn fetch_evaluation(&self, project_id: &str, id: Uuid) -> ApiResult<Evaluation> {
        let record = self
            .repository
            .fetch_evaluation_by_id(project_id, id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Evaluation with id {} not found", id)))?;

        let configs = self.configs_for(project_id, std::slice::from_ref(&record)).await?;
        Ok(render(record, &configs))
    }

    /// Evaluations of an app, newest first.
    pub async fn fetch_list_evaluations(
        &self,
        app: &App,
        project_id: &str,
    ) -> ApiResult<Vec<Evaluation>> {
        let records = self
            .repository
            .list_evaluations_for_app(project_id, app.id)
            .await?;

        let configs = self.configs_for(project_id, &records).await?;
        Ok(records
            .into_iter()
            .map(|record| render(record, &configs))
            .collect())
    }

    /// Scenarios recorded for an evaluation.
    pub async fn fetch_evaluation_scenarios_for_evaluation(
        &self,
        evaluation_id: Uuid,
        project_id: &str,
    ) -> ApiResult<Vec<EvaluationScenario>> {
        self.repository
            .fetch_scenarios_for_evaluation(project_id, evaluation_id)
            .await
    }

    /// Fail with 404 on the first of `ids` that is not an evaluation of the project.
    pub async fn ensure_evaluations_exist(&self, ids: &[Uuid], project_id: &str) -> ApiResult<()> {
        let existing: HashSet<Uuid> = self
            .repository
            .fetch_existing_evaluation_ids(project_id, ids)
            .await?
            .into_iter()
            .collect();

        match ids.iter().find(|id| !existing.contains(id)) {
            Some(missing) => Err(ApiError::NotFound(format!(
                "Evaluation with id {} not found",
                missing
            ))),
            None => Ok(()),
        }
    }

    /// Delete evaluations and their scenarios.
    pub async fn delete_evaluations(&self, ids: &[Uuid], project_id: &str) -> ApiResult<u64> {
        self.repository.delete_evaluations(project_id, ids).await
    }

    /// Line up the scenarios of several evaluations by their inputs.
    ///
    /// Rows appear in order of first appearance. The n-th scenario with given
    /// inputs in one evaluation lands in the n-th row with those inputs.
    /// A repeated id is compared once.
    pub async fn compare_evaluations_scenarios(
        &self,
        evaluation_ids: &[Uuid],
        project_id: &str,
    ) -> ApiResult<ComparisonResult> {
        let mut compared = HashSet::new();
        let evaluation_ids: Vec<Uuid> = evaluation_ids
            .iter()
            .copied()
            .filter(|id| compared.insert(*id))
            .collect();

        let mut evaluations = Vec::with_capacity(evaluation_ids.len());
        let mut rows: Vec<ComparisonRow> = Vec::new();
        let mut rows_by_inputs: HashMap<String, Vec<usize>> = HashMap::new();

        for evaluation_id in evaluation_ids {
            let record = self
                .repository
                .fetch_evaluation_by_id(project_id, evaluation_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Evaluation with id {} not found", evaluation_id))
                })?;

            let scenarios = self
                .repository
                .fetch_scenarios_for_evaluation(project_id, evaluation_id)
                .await?;

            let mut seen: HashMap<String, usize> = HashMap::new();

            for scenario in scenarios {
                let key = serde_json::to_string(&scenario.inputs)?;
                let occurrence = seen.entry(key.clone()).or_insert(0);
                let slots = rows_by_inputs.entry(key).or_default();

                let existing = slots.get(*occurrence).copied();
                let row_index = match existing {
                    Some(index) => index,
                    None => {
                        rows.push(ComparisonRow {
                            inputs: scenario.inputs.clone(),
                            correct_answers: scenario.correct_answers.clone(),
                            variants: Vec::new(),
                        });
                        slots.push(rows.len() - 1);
                        rows.len() - 1
                    }
                };
                *occurrence += 1;

                rows[row_index].variants.push(ComparisonCell {
                    evaluation_id,
                    variant_name: record.variant_name.clone(),
                    output: scenario.outputs.into_iter().next(),
                    results: scenario.results,
                });
            }

            evaluations.push(ComparedEvaluation {
                id: record.id,
                variant_id: record.variant_id,
                variant_name: record.variant_name,
                testset_id: record.testset_id,
            });
        }

        Ok(ComparisonResult { evaluations, rows })
    }

    /// Evaluator configs referenced by the aggregated results of `records`.
    async fn configs_for(
        &self,
        project_id: &str,
        records: &[EvaluationRecord],
    ) -> ApiResult<HashMap<Uuid, EvaluatorConfig>> {
        let ids: Vec<Uuid> = records
            .iter()
            .flat_map(|record| record.aggregated_results.iter())
            .map(|result| result.evaluator_config_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let configs = self
            .repository
            .fetch_evaluator_configs(project_id, &ids)
            .await?;

        Ok(configs.into_iter().map(|c| (c.id, c)).collect())
    }
}

/// Embed evaluator configs into stored aggregated results.
fn render(record: EvaluationRecord, configs: &HashMap<Uuid, EvaluatorConfig>) -> Evaluation {
    let aggregated_results = record
        .aggregated_results
        .iter()
        .filter_map(|stored| match configs.get(&stored.evaluator_config_id) {
            Some(config) => Some(AggregatedResult {
                evaluator_config: config.clone(),
                result: stored.result.clone(),
            }),
            None => {
                tracing::warn!(
                    evaluation_id = %record.id,
                    evaluator_config_id = %stored.evaluator_config_id,
                    "Dropping aggregated result of a deleted evaluator config"
                );
                None
            }
        })
        .collect();

    record.into_evaluation(aggregated_results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        EvaluationStatus, ResultValue, StoredAggregatedResult, Testset, Variant,
    };
    use crate::storage::test_support::{scenario, setup_test_db};

    struct Fixture {
        service: EvaluationService,
        repo: EvaluationRepository,
        app: App,
        variant: Variant,
        testset: Testset,
    }

    async fn fixture() -> Fixture {
        let repo = setup_test_db().await;
        let app = App::new("proj", "qa-bot");
        repo.insert_app(&app).await.unwrap();
        let variant = Variant::new(&app, "v1", vec!["question".to_string()]);
        repo.insert_variant(&variant).await.unwrap();
        let testset = Testset::new(
            "proj",
            "golden",
            vec![HashMap::from([
                ("question".to_string(), "2+2?".to_string()),
                ("correct_answer".to_string(), "4".to_string()),
            ])],
        );
        repo.insert_testset(&testset).await.unwrap();

        Fixture {
            service: EvaluationService::new(repo.clone()),
            repo,
            app,
            variant,
            testset,
        }
    }

    #[tokio::test]
    async fn test_create_new_evaluation() {
        let f = fixture().await;

        let evaluation = f
            .service
            .create_new_evaluation("proj", f.app.id, f.variant.id, f.testset.id, &[])
            .await
            .unwrap();

        assert_eq!(evaluation.status, EvaluationStatus::EvaluationInitialized);
        assert_eq!(evaluation.variant_names, vec!["v1".to_string()]);
        assert_eq!(evaluation.testset_name, "golden");

        let stored = f
            .repo
            .fetch_evaluation_by_id("proj", evaluation.id)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_column_mismatch() {
        let f = fixture().await;
        let variant = Variant::new(
            &f.app,
            "v2",
            vec!["question".to_string(), "context".to_string()],
        );
        f.repo.insert_variant(&variant).await.unwrap();

        let err = f
            .service
            .create_new_evaluation("proj", f.app.id, variant.id, f.testset.id, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg == COLUMN_MISMATCH_MESSAGE));
    }

    #[tokio::test]
    async fn test_create_rejects_variant_of_other_app() {
        let f = fixture().await;
        let other_app = App::new("proj", "other");
        f.repo.insert_app(&other_app).await.unwrap();

        let err = f
            .service
            .create_new_evaluation("proj", other_app.id, f.variant.id, f.testset.id, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_aggregated_results_embed_configs() {
        let f = fixture().await;
        let config = EvaluatorConfig::new("proj", "Exact match", "auto_exact_match");
        f.repo.insert_evaluator_config(&config).await.unwrap();

        let mut record = EvaluationRecord::initialized(
            "proj",
            f.app.id,
            f.variant.id,
            "v1".to_string(),
            f.testset.id,
            "golden".to_string(),
            vec![config.id],
        );
        record.aggregated_results = vec![
            StoredAggregatedResult {
                evaluator_config_id: config.id,
                result: ResultValue {
                    kind: "number".to_string(),
                    value: serde_json::json!(0.75),
                    error: None,
                },
            },
            StoredAggregatedResult {
                evaluator_config_id: Uuid::new_v4(),
                result: ResultValue {
                    kind: "number".to_string(),
                    value: serde_json::json!(0.1),
                    error: None,
                },
            },
        ];
        f.repo.insert_evaluation(&record).await.unwrap();

        let evaluation = f.service.fetch_evaluation("proj", record.id).await.unwrap();
        assert_eq!(evaluation.aggregated_results.len(), 1);
        assert_eq!(evaluation.aggregated_results[0].evaluator_config.name, "Exact match");
        assert_eq!(
            evaluation.aggregated_results[0].result.value,
            serde_json::json!(0.75)
        );
    }

    #[tokio::test]
    async fn test_compare_groups_by_inputs() {
        let f = fixture().await;
        let first = f
            .service
            .create_new_evaluation("proj", f.app.id, f.variant.id, f.testset.id, &[])
            .await
            .unwrap();
        let second = f
            .service
            .create_new_evaluation("proj", f.app.id, f.variant.id, f.testset.id, &[])
            .await
            .unwrap();

        f.repo
            .insert_scenario("proj", &scenario(first.id, "2+2?", "4"))
            .await
            .unwrap();
        f.repo
            .insert_scenario("proj", &scenario(first.id, "3+3?", "6"))
            .await
            .unwrap();
        f.repo
            .insert_scenario("proj", &scenario(second.id, "3+3?", "7"))
            .await
            .unwrap();

        let comparison = f
            .service
            .compare_evaluations_scenarios(&[first.id, second.id], "proj")
            .await
            .unwrap();

        assert_eq!(comparison.evaluations.len(), 2);
        assert_eq!(comparison.rows.len(), 2);
        assert_eq!(comparison.rows[0].variants.len(), 1);
        assert_eq!(comparison.rows[1].variants.len(), 2);
        assert_eq!(comparison.rows[1].variants[0].evaluation_id, first.id);
        assert_eq!(comparison.rows[1].variants[1].evaluation_id, second.id);
        assert_eq!(
            comparison.rows[1].variants[1]
                .output
                .as_ref()
                .map(|o| o.result.value.clone()),
            Some(serde_json::json!("7"))
        );
    }

    #[tokio::test]
    async fn test_compare_repeated_id_once() {
        let f = fixture().await;
        let evaluation = f
            .service
            .create_new_evaluation("proj", f.app.id, f.variant.id, f.testset.id, &[])
            .await
            .unwrap();
        f.repo
            .insert_scenario("proj", &scenario(evaluation.id, "2+2?", "4"))
            .await
            .unwrap();

        let comparison = f
            .service
            .compare_evaluations_scenarios(&[evaluation.id, evaluation.id], "proj")
            .await
            .unwrap();

        assert_eq!(comparison.evaluations.len(), 1);
        assert_eq!(comparison.rows.len(), 1);
        assert_eq!(comparison.rows[0].variants.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_evaluations_exist_in_any_position() {
        let f = fixture().await;
        let evaluation = f
            .service
            .create_new_evaluation("proj", f.app.id, f.variant.id, f.testset.id, &[])
            .await
            .unwrap();
        let missing = Uuid::new_v4();

        f.service
            .ensure_evaluations_exist(&[evaluation.id], "proj")
            .await
            .unwrap();

        for ids in [[missing, evaluation.id], [evaluation.id, missing]] {
            let err = f
                .service
                .ensure_evaluations_exist(&ids, "proj")
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::NotFound(ref msg) if msg.contains(&missing.to_string())));
        }
    }

    #[tokio::test]
    async fn test_compare_unknown_evaluation() {
        let f = fixture().await;
        let err = f
            .service
            .compare_evaluations_scenarios(&[Uuid::new_v4()], "proj")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
