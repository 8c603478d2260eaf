//! Service Module
//!
//! Business logic layer for admission.
//! Services orchestrate between repositories and contain the matching rules.

pub mod admission;
pub mod matching;
pub mod quota;

// Re-export for convenience
pub use admission::{AdmissionError, AdmissionReport, AdmissionService, DroppedBuild, FailedDrop};
pub use matching::{MatchingEngine, RunnerPool};
pub use quota::{AlwaysAdmit, CostFactorPolicy, QuotaPolicy, StaticLedger, UsageLedger};
