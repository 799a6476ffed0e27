//! Route definitions for the API.

use axum::{
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::auth::{default_context, require_jwt, JwtManager, RequestContext};
use crate::AppState;

/// Security scheme modifier for OpenAPI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::fetch_evaluation_ids,
        handlers::create_evaluation,
        handlers::fetch_evaluation_status,
        handlers::fetch_evaluation_results,
        handlers::fetch_evaluation_scenarios,
        handlers::fetch_list_evaluations,
        handlers::fetch_evaluation,
        handlers::delete_evaluations,
        handlers::fetch_evaluation_scenarios_comparison,
        handlers::health_check,
    ),
    components(schemas(
        crate::api::types::NewEvaluation,
        crate::api::types::DeleteEvaluation,
        crate::api::types::StatusResponse,
        crate::api::types::ResultsResponse,
        crate::api::types::HealthResponse,
        crate::domain::Evaluation,
        crate::domain::EvaluationStatus,
        crate::domain::AggregatedResult,
        crate::domain::ResultValue,
        crate::domain::ResultError,
        crate::domain::EvaluatorConfig,
        crate::domain::LlmRunRateLimit,
        crate::domain::EvaluationScenario,
        crate::domain::ScenarioInput,
        crate::domain::ScenarioOutput,
        crate::domain::ScenarioResult,
        crate::domain::CorrectAnswer,
        crate::domain::ComparisonResult,
        crate::domain::ComparedEvaluation,
        crate::domain::ComparisonRow,
        crate::domain::ComparisonCell,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "evaluations", description = "Evaluation management"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "Evaluation API",
        version = "0.1.0",
        description = "Create, inspect and compare evaluations of LLM application variants",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// How callers are identified.
#[derive(Clone)]
pub enum AuthMode {
    /// Bearer JWTs carrying the actor and project.
    Jwt(JwtManager),
    /// Every request runs as a fixed actor (development).
    Disabled(RequestContext),
}

/// Build the API router.
pub fn build_router(state: AppState, auth: AuthMode) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let evaluation_routes = Router::new()
        .route("/evaluations/by_resource/", get(handlers::fetch_evaluation_ids))
        .route(
            "/evaluations/",
            get(handlers::fetch_list_evaluations)
                .post(handlers::create_evaluation)
                .delete(handlers::delete_evaluations),
        )
        .route(
            "/evaluations/evaluation_scenarios/comparison-results/",
            get(handlers::fetch_evaluation_scenarios_comparison),
        )
        .route("/evaluations/{evaluation_id}/", get(handlers::fetch_evaluation))
        .route(
            "/evaluations/{evaluation_id}/status/",
            get(handlers::fetch_evaluation_status),
        )
        .route(
            "/evaluations/{evaluation_id}/results/",
            get(handlers::fetch_evaluation_results),
        )
        .route(
            "/evaluations/{evaluation_id}/evaluation_scenarios/",
            get(handlers::fetch_evaluation_scenarios),
        );

    let evaluation_routes = match auth {
        AuthMode::Jwt(jwt_manager) => {
            evaluation_routes.layer(middleware::from_fn_with_state(jwt_manager, require_jwt))
        }
        AuthMode::Disabled(context) => {
            evaluation_routes.layer(middleware::from_fn_with_state(context, default_context))
        }
    };

    Router::new()
        .merge(evaluation_routes)
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
