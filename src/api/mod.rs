//! HTTP API layer for the evaluation service.
//!
//! Provides REST endpoints for creating, inspecting, comparing and deleting evaluations.

mod extract;
pub mod handlers;
mod routes;
mod types;

pub use routes::{build_router, ApiDoc, AuthMode};
