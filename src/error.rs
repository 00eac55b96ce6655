//! Fatal error taxonomy reported to the caller as a failure document.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactsError {
    /// A required client or utility is absent or too old. Raised before any
    /// network activity.
    #[error("{requirement} is required: {reason}")]
    DependencyMissing { requirement: String, reason: String },

    /// The managed session could not be opened (transport or authentication).
    #[error("unable to connect to {host}: {cause}")]
    Connect { host: String, cause: String },

    /// The console bootstrap utility failed. The message is the cause verbatim.
    #[error("{0}")]
    Invocation(String),

    #[error("failed to save facts: {0:#}")]
    Persistence(anyhow::Error),

    #[error("invalid parameters: {0}")]
    Params(String),
}

impl FactsError {
    /// True for errors raised by the pre-flight check rather than at runtime.
    pub fn is_dependency_missing(&self) -> bool {
        matches!(self, Self::DependencyMissing { .. })
    }
}
