//! Domain types for the evaluation API.
//!
//! These are the entities the handlers read and pass through; their
//! lifecycles are owned by the persistence layer and the evaluation worker.

mod access;
mod app;
mod evaluation;
mod evaluator;
mod job;
mod scenario;

pub use access::*;
pub use app::*;
pub use evaluation::*;
pub use evaluator::*;
pub use job::*;
pub use scenario::*;
