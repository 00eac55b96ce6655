//! Result data types: the open facts mapping and the emitted execution result.

use serde::Serialize;
use serde_json::{Map, Value};

/// Open mapping of fact name to value, in the order the transport produced it.
pub type FactsRecord = Map<String, Value>;

/// Successful outcome handed to the caller. Never mutated after assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Always false: gathering facts never changes device state.
    pub changed: bool,
    pub facts: FactsRecord,
    /// Console path only: the argument list the bootstrap utility was run with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl ExecutionResult {
    pub fn new(facts: FactsRecord) -> Self {
        Self {
            changed: false,
            facts,
            args: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }
}

/// Failure document emitted instead of an [`ExecutionResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureResult {
    pub failed: bool,
    pub changed: bool,
    pub msg: String,
}

impl FailureResult {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: msg.into(),
        }
    }
}
