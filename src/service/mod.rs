//! Business operations behind the HTTP handlers.

mod audit;
mod evaluation;
mod evaluator;

pub use audit::*;
pub use evaluation::*;
pub use evaluator::*;
