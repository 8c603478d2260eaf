//! Error types shared by the admission engine

use thiserror::Error;
use uuid::Uuid;

/// A runner record could not be turned into a matching snapshot
///
/// Fatal for the pass: a malformed runner must not silently disappear from
/// every decision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A required matching attribute is absent from the record
    #[error("runner {runner_id} is missing required attribute `{attribute}`")]
    MissingAttribute {
        runner_id: String,
        attribute: &'static str,
    },

    /// A cost factor is negative, NaN or infinite
    #[error("runner {runner_id} has invalid {attribute}: {value}")]
    InvalidCostFactor {
        runner_id: String,
        attribute: &'static str,
        value: f64,
    },
}

impl ConfigurationError {
    pub fn missing(runner_id: impl Into<String>, attribute: &'static str) -> Self {
        Self::MissingAttribute {
            runner_id: runner_id.into(),
            attribute,
        }
    }
}

/// A quota lookup failed for a runner/build pair
///
/// Recovered per build by the engine: the pair counts as "not within
/// quota" without being reported as confirmed quota exhaustion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaEvaluationError {
    /// The usage ledger could not be reached
    #[error("usage ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The ledger holds no usage entry for the namespace
    #[error("no usage entry for project {0}")]
    UnknownNamespace(Uuid),
}
