//! Query condition builder and evaluator
//!
//! A declarative filter an embedder can apply to rows already returned by
//! `Database::query`. The core planner does not call into this module.

mod condition;

pub use condition::{CompareOp, Condition, Query};
