//! HTTP request handlers.
//!
//! Each handler resolves the request context, runs its access check through
//! the [`AccessGate`](crate::auth::AccessGate) and delegates to the service layer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::types::*;
use crate::auth::RequestContext;
use crate::domain::{
    ComparisonResult, Evaluation, EvaluationJob, EvaluationScenario, ObjectRef, ObjectType,
    Permission,
};
use crate::error::{ApiError, ApiResult};
use crate::service::{check_ai_critique_inputs, update_last_modified_by};
use crate::AppState;

const LIST_ERROR_CONTEXT: &str = "Could not retrieve evaluation results: ";

/// Ids of the evaluations that used any of the given resources.
///
/// GET /evaluations/by_resource/
#[utoipa::path(
    get,
    path = "/evaluations/by_resource/",
    params(
        ("app_id" = Option<String>, Query, description = "App the resources belong to"),
        ("resource_type" = String, Query, description = "testset, evaluator_config or variant"),
        ("resource_ids" = Vec<String>, Query, description = "Resource ids, repeated")
    ),
    responses(
        (status = 200, description = "Evaluation ids", body = Vec<String>),
        (status = 403, description = "Permission denied"),
        (status = 500, description = "Unsupported resource type or internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_evaluation_ids(
    State(state): State<AppState>,
    context: RequestContext,
    ApiQuery(pairs): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<String>>> {
    state
        .access
        .require(&context, Permission::ViewEvaluation, None)
        .await?;

    let query = ByResourceQuery::from_pairs(pairs)?;

    tracing::debug!(
        app_id = ?query.app_id,
        resource_type = ?query.resource_type,
        resource_ids = query.resource_ids.len(),
        "Fetching evaluations by resource"
    );

    let evaluations = state
        .repository
        .fetch_evaluations_by_resource(
            query.resource_type,
            &context.project_id,
            &query.resource_ids,
        )
        .await?;

    Ok(Json(
        evaluations
            .into_iter()
            .map(|evaluation| evaluation.id.to_string())
            .collect(),
    ))
}

/// Create one evaluation per variant and queue it for the worker.
///
/// POST /evaluations/
#[utoipa::path(
    post,
    path = "/evaluations/",
    request_body = NewEvaluation,
    responses(
        (status = 200, description = "Evaluations created", body = Vec<Evaluation>),
        (status = 400, description = "Testset columns do not match or provider key missing"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "App, variant, testset or evaluator config not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn create_evaluation(
    State(state): State<AppState>,
    context: RequestContext,
    ApiJson(payload): ApiJson<NewEvaluation>,
) -> ApiResult<Json<Vec<Evaluation>>> {
    let app = state
        .repository
        .fetch_app_by_id(&context.project_id, payload.app_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("App not found".to_string()))?;

    state
        .access
        .require(&context, Permission::CreateEvaluation, None)
        .await?;

    let lm_providers_keys = payload.lm_providers_keys.unwrap_or_default();
    check_ai_critique_inputs(
        &state.repository,
        &context.project_id,
        &payload.evaluators_configs,
        &lm_providers_keys,
        state.openai_api_key.as_deref(),
    )
    .await?;

    let mut evaluations = Vec::with_capacity(payload.variant_ids.len());

    for variant_id in payload.variant_ids {
        let evaluation = state
            .service
            .create_new_evaluation(
                &context.project_id,
                app.id,
                variant_id,
                payload.testset_id,
                &payload.evaluators_configs,
            )
            .await?;

        state
            .queue
            .enqueue(&EvaluationJob {
                app_id: app.id,
                project_id: context.project_id.clone(),
                variant_id,
                evaluators_config_ids: payload.evaluators_configs.clone(),
                testset_id: payload.testset_id,
                evaluation_id: evaluation.id,
                rate_limit_config: payload.rate_limit.clone(),
                lm_providers_keys: lm_providers_keys.clone(),
                correct_answer_column: payload.correct_answer_column.clone(),
            })
            .await?;

        evaluations.push(evaluation);
    }

    update_last_modified_by(
        &state.repository,
        &context.user_id,
        &app.id.to_string(),
        ObjectType::App,
        &context.project_id,
    )
    .await?;

    tracing::info!(
        app_id = %app.id,
        user_id = %context.user_id,
        evaluations = evaluations.len(),
        "Evaluations created"
    );

    Ok(Json(evaluations))
}

/// Status of an evaluation.
///
/// GET /evaluations/{evaluation_id}/status/
#[utoipa::path(
    get,
    path = "/evaluations/{evaluation_id}/status/",
    params(("evaluation_id" = String, Path, description = "Evaluation ID")),
    responses(
        (status = 200, description = "Evaluation status", body = StatusResponse),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Evaluation not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_evaluation_status(
    State(state): State<AppState>,
    context: RequestContext,
    Path(evaluation_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let evaluation = viewable_evaluation(&state, &context, &evaluation_id).await?;

    Ok(Json(StatusResponse {
        status: evaluation.status,
    }))
}

/// Aggregated results of an evaluation.
///
/// GET /evaluations/{evaluation_id}/results/
#[utoipa::path(
    get,
    path = "/evaluations/{evaluation_id}/results/",
    params(("evaluation_id" = String, Path, description = "Evaluation ID")),
    responses(
        (status = 200, description = "Aggregated results", body = ResultsResponse),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Evaluation not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_evaluation_results(
    State(state): State<AppState>,
    context: RequestContext,
    Path(evaluation_id): Path<String>,
) -> ApiResult<Json<ResultsResponse>> {
    let evaluation = viewable_evaluation(&state, &context, &evaluation_id).await?;

    Ok(Json(ResultsResponse {
        evaluation_id: evaluation.id,
        results: evaluation.aggregated_results,
    }))
}

/// Scenarios recorded for an evaluation.
///
/// GET /evaluations/{evaluation_id}/evaluation_scenarios/
#[utoipa::path(
    get,
    path = "/evaluations/{evaluation_id}/evaluation_scenarios/",
    params(("evaluation_id" = String, Path, description = "Evaluation ID")),
    responses(
        (status = 200, description = "Evaluation scenarios", body = Vec<EvaluationScenario>),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Evaluation not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_evaluation_scenarios(
    State(state): State<AppState>,
    context: RequestContext,
    Path(evaluation_id): Path<String>,
) -> ApiResult<Json<Vec<EvaluationScenario>>> {
    let evaluation = viewable_evaluation(&state, &context, &evaluation_id).await?;

    let scenarios = state
        .service
        .fetch_evaluation_scenarios_for_evaluation(evaluation.id, &context.project_id)
        .await?;

    Ok(Json(scenarios))
}

/// Evaluations of an app.
///
/// GET /evaluations/?app_id=
#[utoipa::path(
    get,
    path = "/evaluations/",
    params(("app_id" = Uuid, Query, description = "App ID")),
    responses(
        (status = 200, description = "Evaluations of the app", body = Vec<Evaluation>),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "App not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_list_evaluations(
    State(state): State<AppState>,
    context: RequestContext,
    ApiQuery(query): ApiQuery<ListEvaluationsQuery>,
) -> ApiResult<Json<Vec<Evaluation>>> {
    list_for_app(&state, &context, query.app_id)
        .await
        .map(Json)
        .map_err(|e| e.with_context(LIST_ERROR_CONTEXT))
}

async fn list_for_app(
    state: &AppState,
    context: &RequestContext,
    app_id: Uuid,
) -> ApiResult<Vec<Evaluation>> {
    let app = state
        .repository
        .fetch_app_by_id(&context.project_id, app_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("App with id {} not found", app_id)))?;

    state
        .access
        .require(context, Permission::ViewEvaluation, Some(&ObjectRef::app(app.id)))
        .await?;

    state
        .service
        .fetch_list_evaluations(&app, &context.project_id)
        .await
}

/// A single evaluation.
///
/// GET /evaluations/{evaluation_id}/
#[utoipa::path(
    get,
    path = "/evaluations/{evaluation_id}/",
    params(("evaluation_id" = String, Path, description = "Evaluation ID")),
    responses(
        (status = 200, description = "Evaluation", body = Evaluation),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Evaluation not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_evaluation(
    State(state): State<AppState>,
    context: RequestContext,
    Path(evaluation_id): Path<String>,
) -> ApiResult<Json<Evaluation>> {
    viewable_evaluation(&state, &context, &evaluation_id)
        .await
        .map(Json)
}

/// Delete evaluations and their scenarios.
///
/// DELETE /evaluations/
#[utoipa::path(
    delete,
    path = "/evaluations/",
    request_body = DeleteEvaluation,
    responses(
        (status = 204, description = "Evaluations deleted"),
        (status = 400, description = "Malformed evaluation id"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Evaluation not found"),
        (status = 500, description = "Empty id list or internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn delete_evaluations(
    State(state): State<AppState>,
    context: RequestContext,
    ApiJson(payload): ApiJson<DeleteEvaluation>,
) -> ApiResult<StatusCode> {
    let ids = payload
        .evaluations_ids
        .iter()
        .map(|id| parse_evaluation_id(id))
        .collect::<ApiResult<Vec<Uuid>>>()?;

    let Some(first) = ids.first() else {
        return Err(ApiError::Internal(
            "evaluations_ids must not be empty".to_string(),
        ));
    };

    for id in &ids {
        state
            .access
            .require(&context, Permission::DeleteEvaluation, Some(&ObjectRef::evaluation(id)))
            .await?;
    }

    state
        .service
        .ensure_evaluations_exist(&ids, &context.project_id)
        .await?;

    update_last_modified_by(
        &state.repository,
        &context.user_id,
        &first.to_string(),
        ObjectType::Evaluation,
        &context.project_id,
    )
    .await?;

    let deleted = state
        .service
        .delete_evaluations(&ids, &context.project_id)
        .await?;

    tracing::info!(
        user_id = %context.user_id,
        requested = ids.len(),
        deleted,
        "Evaluations deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Scenarios of several evaluations lined up by their inputs.
///
/// GET /evaluations/evaluation_scenarios/comparison-results/
#[utoipa::path(
    get,
    path = "/evaluations/evaluation_scenarios/comparison-results/",
    params(("evaluations_ids" = String, Query, description = "Comma-separated evaluation IDs")),
    responses(
        (status = 200, description = "Comparison", body = ComparisonResult),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Evaluation not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer_auth" = [])),
    tag = "evaluations"
)]
pub async fn fetch_evaluation_scenarios_comparison(
    State(state): State<AppState>,
    context: RequestContext,
    ApiQuery(query): ApiQuery<ComparisonQuery>,
) -> ApiResult<Json<ComparisonResult>> {
    let raw_ids = query.ids();

    for raw in &raw_ids {
        state
            .access
            .require(&context, Permission::ViewEvaluation, Some(&ObjectRef::evaluation(*raw)))
            .await?;
    }

    let ids = raw_ids
        .iter()
        .map(|raw| parse_evaluation_id(raw))
        .collect::<ApiResult<Vec<Uuid>>>()?;

    let comparison = state
        .service
        .compare_evaluations_scenarios(&ids, &context.project_id)
        .await?;

    Ok(Json(comparison))
}

/// Health check endpoint.
///
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_status = match sqlx::query("SELECT 1")
        .fetch_one(state.repository.pool())
        .await
    {
        Ok(_) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Load an evaluation (404 if missing), then check the caller may view it.
async fn viewable_evaluation(
    state: &AppState,
    context: &RequestContext,
    raw_id: &str,
) -> ApiResult<Evaluation> {
    let id = parse_evaluation_id(raw_id)?;
    let evaluation = state.service.fetch_evaluation(&context.project_id, id).await?;

    state
        .access
        .require(context, Permission::ViewEvaluation, Some(&ObjectRef::evaluation(id)))
        .await?;

    Ok(evaluation)
}
