//! Repository layer for database operations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::domain::{
    App, EvaluationRecord, EvaluationScenario, EvaluatorConfig, ObjectRef, ObjectType,
    ProjectMember, ResourceType, Testset, Variant,
};
use crate::error::ApiResult;
use crate::storage::models::{
    parse_uuid, AppRow, EvaluationRow, EvaluationScenarioRow, EvaluatorConfigRow, ProjectMemberRow,
    TestsetRow, VariantRow,
};

/// `?, ?, ?` for binding a list into an `IN (...)` clause.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Repository for all evaluation database operations.
#[derive(Clone)]
pub struct EvaluationRepository {
    pool: SqlitePool,
}

impl EvaluationRepository {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl EvaluationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> ApiResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS apps (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                app_name TEXT NOT NULL,
                modified_by_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_apps_project ON apps(project_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variants (
                id TEXT PRIMARY KEY,
                app_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                variant_name TEXT NOT NULL,
                input_names TEXT NOT NULL,
                revision INTEGER NOT NULL DEFAULT 1,
                modified_by_id TEXT,
                updated_at TEXT,
                FOREIGN KEY (app_id) REFERENCES apps(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_variants_app ON variants(app_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS testsets (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                csvdata TEXT NOT NULL,
                modified_by_id TEXT,
                updated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_testsets_project ON testsets(project_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evaluator_configs (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                app_id TEXT,
                name TEXT NOT NULL,
                evaluator_key TEXT NOT NULL,
                settings_values TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evaluator_configs_project ON evaluator_configs(project_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evaluations (
                id TEXT PRIMARY KEY,
                app_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                variant_id TEXT NOT NULL,
                variant_name TEXT NOT NULL,
                testset_id TEXT NOT NULL,
                testset_name TEXT NOT NULL,
                status TEXT NOT NULL,
                evaluators_configs TEXT NOT NULL,
                aggregated_results TEXT NOT NULL,
                average_latency REAL,
                average_cost REAL,
                total_cost REAL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evaluations_project_app ON evaluations(project_id, app_id);
            CREATE INDEX IF NOT EXISTS idx_evaluations_testset ON evaluations(testset_id);
            CREATE INDEX IF NOT EXISTS idx_evaluations_variant ON evaluations(variant_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS evaluation_scenarios (
                id TEXT PRIMARY KEY,
                evaluation_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                inputs TEXT NOT NULL,
                outputs TEXT NOT NULL,
                correct_answers TEXT NOT NULL,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                note TEXT,
                results TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evaluation_scenarios_evaluation ON evaluation_scenarios(evaluation_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS project_members (
                project_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (project_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Apps ====================

    /// Save an app.
    pub async fn insert_app(&self, app: &App) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO apps (id, project_id, app_name, modified_by_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(app.id.to_string())
        .bind(&app.project_id)
        .bind(&app.app_name)
        .bind(&app.modified_by_id)
        .bind(app.created_at.to_rfc3339())
        .bind(app.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch an app within a project.
    pub async fn fetch_app_by_id(&self, project_id: &str, id: Uuid) -> ApiResult<Option<App>> {
        let row: Option<AppRow> =
            sqlx::query_as("SELECT * FROM apps WHERE id = ? AND project_id = ?")
                .bind(id.to_string())
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(App::try_from).transpose()
    }

    /// Stamp an app as modified by a user. Returns false if no app matched.
    pub async fn touch_app(
        &self,
        project_id: &str,
        id: Uuid,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE apps SET modified_by_id = ?, updated_at = ? WHERE id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Variants ====================

    /// Save a variant.
    pub async fn insert_variant(&self, variant: &Variant) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO variants (id, app_id, project_id, variant_name, input_names, revision)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(variant.id.to_string())
        .bind(variant.app_id.to_string())
        .bind(&variant.project_id)
        .bind(&variant.variant_name)
        .bind(serde_json::to_string(&variant.input_names)?)
        .bind(variant.revision)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a variant within a project.
    pub async fn fetch_variant_by_id(
        &self,
        project_id: &str,
        id: Uuid,
    ) -> ApiResult<Option<Variant>> {
        let row: Option<VariantRow> = sqlx::query_as(
            r#"
            SELECT id, app_id, project_id, variant_name, input_names, revision
            FROM variants WHERE id = ? AND project_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Variant::try_from).transpose()
    }

    // ==================== Testsets ====================

    /// Save a testset.
    pub async fn insert_testset(&self, testset: &Testset) -> ApiResult<()> {
        sqlx::query("INSERT INTO testsets (id, project_id, name, csvdata) VALUES (?, ?, ?, ?)")
            .bind(testset.id.to_string())
            .bind(&testset.project_id)
            .bind(&testset.name)
            .bind(serde_json::to_string(&testset.csvdata)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fetch a testset within a project.
    pub async fn fetch_testset_by_id(
        &self,
        project_id: &str,
        id: Uuid,
    ) -> ApiResult<Option<Testset>> {
        let row: Option<TestsetRow> = sqlx::query_as(
            "SELECT id, project_id, name, csvdata FROM testsets WHERE id = ? AND project_id = ?",
        )
        .bind(id.to_string())
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Testset::try_from).transpose()
    }

    /// Stamp a testset as modified by a user. Returns false if no testset matched.
    pub async fn touch_testset(
        &self,
        project_id: &str,
        id: Uuid,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE testsets SET modified_by_id = ?, updated_at = ? WHERE id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Evaluator Configs ====================

    /// Save an evaluator config.
    pub async fn insert_evaluator_config(&self, config: &EvaluatorConfig) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO evaluator_configs (id, project_id, app_id, name, evaluator_key, settings_values)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(config.id.to_string())
        .bind(&config.project_id)
        .bind(config.app_id.map(|id| id.to_string()))
        .bind(&config.name)
        .bind(&config.evaluator_key)
        .bind(serde_json::to_string(&config.settings_values)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the evaluator configs with the given ids. Unknown ids are skipped.
    pub async fn fetch_evaluator_configs(
        &self,
        project_id: &str,
        ids: &[Uuid],
    ) -> ApiResult<Vec<EvaluatorConfig>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT * FROM evaluator_configs WHERE project_id = ? AND id IN ({})",
            placeholders(ids.len())
        );

        let mut query_builder = sqlx::query_as::<_, EvaluatorConfigRow>(&query).bind(project_id);
        for id in ids {
            query_builder = query_builder.bind(id.to_string());
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        rows.into_iter().map(EvaluatorConfig::try_from).collect()
    }

    // ==================== Evaluations ====================

    /// Save an evaluation.
    pub async fn insert_evaluation(&self, evaluation: &EvaluationRecord) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO evaluations (
                id, app_id, project_id, variant_id, variant_name, testset_id, testset_name,
                status, evaluators_configs, aggregated_results, average_latency, average_cost,
                total_cost, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(evaluation.id.to_string())
        .bind(evaluation.app_id.to_string())
        .bind(&evaluation.project_id)
        .bind(evaluation.variant_id.to_string())
        .bind(&evaluation.variant_name)
        .bind(evaluation.testset_id.to_string())
        .bind(&evaluation.testset_name)
        .bind(evaluation.status.to_string())
        .bind(serde_json::to_string(&evaluation.evaluators_configs)?)
        .bind(serde_json::to_string(&evaluation.aggregated_results)?)
        .bind(evaluation.average_latency)
        .bind(evaluation.average_cost)
        .bind(evaluation.total_cost)
        .bind(evaluation.created_at.to_rfc3339())
        .bind(evaluation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch an evaluation within a project.
    pub async fn fetch_evaluation_by_id(
        &self,
        project_id: &str,
        id: Uuid,
    ) -> ApiResult<Option<EvaluationRecord>> {
        let row: Option<EvaluationRow> =
            sqlx::query_as("SELECT * FROM evaluations WHERE id = ? AND project_id = ?")
                .bind(id.to_string())
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(EvaluationRecord::try_from).transpose()
    }

    /// List the evaluations of an app, newest first.
    pub async fn list_evaluations_for_app(
        &self,
        project_id: &str,
        app_id: Uuid,
    ) -> ApiResult<Vec<EvaluationRecord>> {
        let rows: Vec<EvaluationRow> = sqlx::query_as(
            "SELECT * FROM evaluations WHERE project_id = ? AND app_id = ? ORDER BY created_at DESC",
        )
        .bind(project_id)
        .bind(app_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EvaluationRecord::try_from).collect()
    }

    /// Evaluations that used any of the given testsets, variants or evaluator configs.
    pub async fn fetch_evaluations_by_resource(
        &self,
        resource_type: ResourceType,
        project_id: &str,
        resource_ids: &[String],
    ) -> ApiResult<Vec<EvaluationRecord>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }

        let condition = match resource_type {
            ResourceType::Testset => "testset_id IN ({})",
            ResourceType::Variant => "variant_id IN ({})",
            ResourceType::EvaluatorConfig => {
                "EXISTS (SELECT 1 FROM json_each(evaluations.evaluators_configs) WHERE json_each.value IN ({}))"
            }
        }
        .replace("{}", &placeholders(resource_ids.len()));

        let query = format!(
            "SELECT * FROM evaluations WHERE project_id = ? AND {} ORDER BY created_at",
            condition
        );

        let mut query_builder = sqlx::query_as::<_, EvaluationRow>(&query).bind(project_id);
        for id in resource_ids {
            query_builder = query_builder.bind(id);
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        rows.into_iter().map(EvaluationRecord::try_from).collect()
    }

    /// Which of `ids` exist in the project.
    pub async fn fetch_existing_evaluation_ids(
        &self,
        project_id: &str,
        ids: &[Uuid],
    ) -> ApiResult<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT id FROM evaluations WHERE project_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let mut query_builder = sqlx::query_as::<_, (String,)>(&query).bind(project_id);
        for id in ids {
            query_builder = query_builder.bind(id.to_string());
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(id,)| parse_uuid(&id))
            .collect()
    }

    /// Delete evaluations and their scenarios. Returns the number of evaluations removed.
    pub async fn delete_evaluations(&self, project_id: &str, ids: &[Uuid]) -> ApiResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let in_clause = placeholders(ids.len());
        let mut tx = self.pool.begin().await?;

        let scenario_query = format!(
            "DELETE FROM evaluation_scenarios WHERE project_id = ? AND evaluation_id IN ({})",
            in_clause
        );
        let mut delete_scenarios = sqlx::query(&scenario_query).bind(project_id);
        for id in ids {
            delete_scenarios = delete_scenarios.bind(id.to_string());
        }
        delete_scenarios.execute(&mut *tx).await?;

        let evaluation_query = format!(
            "DELETE FROM evaluations WHERE project_id = ? AND id IN ({})",
            in_clause
        );
        let mut delete_evaluations = sqlx::query(&evaluation_query).bind(project_id);
        for id in ids {
            delete_evaluations = delete_evaluations.bind(id.to_string());
        }
        let result = delete_evaluations.execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    // ==================== Evaluation Scenarios ====================

    /// Save an evaluation scenario.
    pub async fn insert_scenario(
        &self,
        project_id: &str,
        scenario: &EvaluationScenario,
    ) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO evaluation_scenarios (
                id, evaluation_id, project_id, inputs, outputs, correct_answers,
                is_pinned, note, results, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(scenario.id.to_string())
        .bind(scenario.evaluation_id.to_string())
        .bind(project_id)
        .bind(serde_json::to_string(&scenario.inputs)?)
        .bind(serde_json::to_string(&scenario.outputs)?)
        .bind(serde_json::to_string(&scenario.correct_answers)?)
        .bind(scenario.is_pinned)
        .bind(&scenario.note)
        .bind(serde_json::to_string(&scenario.results)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Scenarios of an evaluation in insertion order.
    pub async fn fetch_scenarios_for_evaluation(
        &self,
        project_id: &str,
        evaluation_id: Uuid,
    ) -> ApiResult<Vec<EvaluationScenario>> {
        let rows: Vec<EvaluationScenarioRow> = sqlx::query_as(
            r#"
            SELECT id, evaluation_id, inputs, outputs, correct_answers, is_pinned, note, results
            FROM evaluation_scenarios
            WHERE project_id = ? AND evaluation_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(project_id)
        .bind(evaluation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EvaluationScenario::try_from).collect()
    }

    // ==================== Project Members ====================

    /// Add or replace a user's role in a project.
    pub async fn upsert_project_member(&self, member: &ProjectMember) -> ApiResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role) VALUES (?, ?, ?)
            ON CONFLICT(project_id, user_id) DO UPDATE SET role = excluded.role
            "#,
        )
        .bind(&member.project_id)
        .bind(&member.user_id)
        .bind(member.role.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A user's membership in a project, if any.
    pub async fn fetch_project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> ApiResult<Option<ProjectMember>> {
        let row: Option<ProjectMemberRow> = sqlx::query_as(
            "SELECT project_id, user_id, role FROM project_members WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProjectMember::try_from).transpose()
    }

    /// Project an object belongs to, or `None` if it does not exist.
    pub async fn fetch_object_project(&self, object: &ObjectRef) -> ApiResult<Option<String>> {
        let table = match object.object_type {
            ObjectType::App => "apps",
            ObjectType::Variant => "variants",
            ObjectType::Testset => "testsets",
            ObjectType::Evaluation => "evaluations",
        };

        let query = format!("SELECT project_id FROM {} WHERE id = ?", table);
        let row: Option<(String,)> = sqlx::query_as(&query)
            .bind(&object.object_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(project_id,)| project_id))
    }
}
