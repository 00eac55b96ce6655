//! Facts record, normalization, and JSON persistence.

pub mod normalize;
pub mod persistence;
pub mod types;

pub use normalize::normalize;
pub use persistence::save_facts;
pub use types::{ExecutionResult, FactsRecord};
