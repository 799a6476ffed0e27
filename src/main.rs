//! Evaluation API server.

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;

use evaluation_api::api::{build_router, AuthMode};
use evaluation_api::auth::{AccessGate, JwtManager, ProjectRoleAccessChecker, RequestContext};
use evaluation_api::config::Config;
use evaluation_api::logging;
use evaluation_api::queue::SqliteJobQueue;
use evaluation_api::service::EvaluationService;
use evaluation_api::storage::EvaluationRepository;
use evaluation_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is expected in production
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    logging::init(config.logging.format);

    tracing::info!("Starting Evaluation API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        auth_enabled = %config.auth.enabled,
        access_enforced = %config.access.enforce,
        queue = %config.queue.name,
        "Configuration loaded"
    );

    let pool = SqlitePool::connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    let repository = EvaluationRepository::new(pool.clone());
    repository.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        anyhow::anyhow!("Schema initialization error: {}", e)
    })?;

    let queue = SqliteJobQueue::new(pool, config.queue.name.clone());
    queue.init().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize job queue");
        anyhow::anyhow!("Queue initialization error: {}", e)
    })?;

    tracing::info!("Database connected and schema initialized");

    let access = AccessGate::new(
        config.access.enforce,
        Arc::new(ProjectRoleAccessChecker::new(repository.clone())),
    );

    let state = AppState {
        service: EvaluationService::new(repository.clone()),
        repository,
        queue: Arc::new(queue),
        access,
        openai_api_key: config.evaluators.openai_api_key.clone(),
    };

    let auth = if config.auth.enabled {
        tracing::info!(issuer = %config.auth.jwt_issuer, "Authentication enabled");
        AuthMode::Jwt(JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.jwt_issuer.clone(),
            config.auth.token_duration_hours,
        ))
    } else {
        tracing::warn!(
            user_id = %config.auth.default_user_id,
            project_id = %config.auth.default_project_id,
            "Authentication is DISABLED - enable for production"
        );
        AuthMode::Disabled(RequestContext::new(
            config.auth.default_user_id.clone(),
            config.auth.default_project_id.clone(),
        ))
    };

    let app = build_router(state, auth);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
