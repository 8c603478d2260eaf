//! Admission outcome types

use serde::{Deserialize, Serialize};

/// Why a build was dropped before it could be queued
///
/// The two reasons call for different remediation, so they are never
/// merged into a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No runner in the fleet accepts the build's protection and tags
    NoMatchingRunner,

    /// Only instance runners accept the build and none of them is within quota
    CiQuotaExceeded,
}

impl DropReason {
    /// Stable identifier stored on the build record
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoMatchingRunner => "no_matching_runner",
            DropReason::CiQuotaExceeded => "ci_quota_exceeded",
        }
    }

    /// Message shown to whoever owns the failed build
    pub fn description(&self) -> &'static str {
        match self {
            DropReason::NoMatchingRunner => {
                "No runner is available that matches the job's tags and protection; register a compatible runner"
            }
            DropReason::CiQuotaExceeded => {
                "The namespace has used up its shared runner quota; purchase more quota or use a dedicated runner"
            }
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one build against the runner pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum AdmissionResult {
    Admitted,
    Dropped(DropReason),
}

impl AdmissionResult {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionResult::Admitted)
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            AdmissionResult::Admitted => None,
            AdmissionResult::Dropped(reason) => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_identifiers() {
        assert_eq!(DropReason::NoMatchingRunner.to_string(), "no_matching_runner");
        assert_eq!(DropReason::CiQuotaExceeded.to_string(), "ci_quota_exceeded");
    }

    #[test]
    fn test_drop_reason_serializes_as_identifier() {
        let json = serde_json::to_string(&DropReason::CiQuotaExceeded).unwrap();
        assert_eq!(json, "\"ci_quota_exceeded\"");
    }

    #[test]
    fn test_admission_result_accessors() {
        assert!(AdmissionResult::Admitted.is_admitted());
        assert_eq!(AdmissionResult::Admitted.drop_reason(), None);

        let dropped = AdmissionResult::Dropped(DropReason::NoMatchingRunner);
        assert!(!dropped.is_admitted());
        assert_eq!(dropped.drop_reason(), Some(DropReason::NoMatchingRunner));
    }
}
