//! Authentication and authorization for the evaluation API.
//!
//! - JWT: bearer tokens carrying the actor and its project
//! - Access checks: per-action permission decisions ("cloud mode")

mod access;
mod context;
mod jwt;
mod middleware;

pub use access::*;
pub use context::*;
pub use jwt::*;
pub use middleware::*;
