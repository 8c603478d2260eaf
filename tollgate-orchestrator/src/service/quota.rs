//! Quota policy
//!
//! Decides whether a build may consume an instance runner's quota. Policies
//! are injected into the matching engine, so an edition with usage billing
//! swaps in [`CostFactorPolicy`] without touching the matcher.

use std::collections::HashMap;
use std::sync::Arc;
use tollgate_core::domain::build::BuildMatcher;
use tollgate_core::domain::runner::RunnerMatcher;
use tollgate_core::error::QuotaEvaluationError;
use uuid::Uuid;

use crate::config::QuotaPolicyKind;

/// Usage gate for instance runners
///
/// Must be a side-effect-free read of current usage. Errors are recovered
/// by the caller; they must not be used to signal exhausted quota.
pub trait QuotaPolicy: Send + Sync {
    /// Whether the build may run on the runner within current usage limits
    fn matches_quota(
        &self,
        runner: &RunnerMatcher,
        build: &BuildMatcher,
    ) -> Result<bool, QuotaEvaluationError>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Policy that never restricts usage
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAdmit;

impl QuotaPolicy for AlwaysAdmit {
    fn matches_quota(
        &self,
        _runner: &RunnerMatcher,
        _build: &BuildMatcher,
    ) -> Result<bool, QuotaEvaluationError> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "always_admit"
    }
}

/// Read access to the namespace usage ledger
pub trait UsageLedger: Send + Sync {
    /// Whether the project's namespace has shared runner minutes left
    fn minutes_remaining(&self, project_id: Uuid) -> Result<bool, QuotaEvaluationError>;
}

impl<L: UsageLedger + ?Sized> UsageLedger for Arc<L> {
    fn minutes_remaining(&self, project_id: Uuid) -> Result<bool, QuotaEvaluationError> {
        (**self).minutes_remaining(project_id)
    }
}

/// Cost factor aware policy
///
/// A build is within quota on a runner that charges nothing for its
/// visibility, or when the namespace still has minutes left.
pub struct CostFactorPolicy<L: UsageLedger> {
    ledger: L,
}

impl<L: UsageLedger> CostFactorPolicy<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }
}

impl<L: UsageLedger> QuotaPolicy for CostFactorPolicy<L> {
    fn matches_quota(
        &self,
        runner: &RunnerMatcher,
        build: &BuildMatcher,
    ) -> Result<bool, QuotaEvaluationError> {
        if runner.minutes_cost_factor(build.visibility()) == 0.0 {
            return Ok(true);
        }

        self.ledger.minutes_remaining(build.project_id())
    }

    fn name(&self) -> &'static str {
        "cost_factor"
    }
}

/// Creates the policy selected by configuration
pub fn policy_for(kind: QuotaPolicyKind, ledger: Arc<dyn UsageLedger>) -> Arc<dyn QuotaPolicy> {
    match kind {
        QuotaPolicyKind::AlwaysAdmit => Arc::new(AlwaysAdmit),
        QuotaPolicyKind::CostFactor => Arc::new(CostFactorPolicy::new(ledger)),
    }
}

/// Fixed snapshot of remaining minutes per project
#[derive(Debug, Clone, Default)]
pub struct StaticLedger {
    remaining: HashMap<Uuid, f64>,
    outage: Option<String>,
}

impl StaticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minutes left for a project
    pub fn with_remaining(mut self, project_id: Uuid, minutes: f64) -> Self {
        self.remaining.insert(project_id, minutes);
        self
    }

    /// A ledger whose every lookup fails
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            remaining: HashMap::new(),
            outage: Some(message.into()),
        }
    }
}

impl UsageLedger for StaticLedger {
    fn minutes_remaining(&self, project_id: Uuid) -> Result<bool, QuotaEvaluationError> {
        if let Some(message) = &self.outage {
            return Err(QuotaEvaluationError::LedgerUnavailable(message.clone()));
        }

        self.remaining
            .get(&project_id)
            .map(|minutes| *minutes > 0.0)
            .ok_or(QuotaEvaluationError::UnknownNamespace(project_id))
    }
}
