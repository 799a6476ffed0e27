//! Storage layer for the evaluation API.
//!
//! Provides database access via SQLx with SQLite.

mod models;
mod repository;

pub(crate) use models::QueuedJobRow;
pub use repository::EvaluationRepository;

#[cfg(test)]
pub(crate) use repository::tests as test_support;
