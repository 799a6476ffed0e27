//! Evaluation API
//!
//! HTTP service for creating, inspecting, comparing and deleting evaluations
//! of LLM application variants. Evaluations are queued for a separate worker
//! that runs the evaluators.

use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod queue;
pub mod service;
pub mod storage;

use crate::auth::AccessGate;
use crate::queue::JobQueue;
use crate::service::EvaluationService;
use crate::storage::EvaluationRepository;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database repository.
    pub repository: EvaluationRepository,
    /// Evaluation operations.
    pub service: EvaluationService,
    /// Queue evaluation jobs are published to.
    pub queue: Arc<dyn JobQueue>,
    /// Per-action permission checks.
    pub access: AccessGate,
    /// Fallback key for AI critique evaluators.
    pub openai_api_key: Option<String>,
}
