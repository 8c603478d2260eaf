//! Matching engine
//!
//! Classifies a build against the runner pool of one admission pass:
//! admitted when some runner could take it, otherwise dropped with the
//! reason that tells the owner what to fix. The engine does not pick the
//! runner that will eventually run the build.

use std::sync::Arc;
use tollgate_core::domain::admission::{AdmissionResult, DropReason};
use tollgate_core::domain::build::BuildMatcher;
use tollgate_core::domain::runner::RunnerMatcher;
use tollgate_core::dto::runner::RunnerRecord;
use tollgate_core::error::ConfigurationError;
use tracing::{debug, warn};

use crate::service::quota::QuotaPolicy;

/// Runner snapshots for one pass
///
/// Identical runners are collapsed and the rest split by scope, since only
/// instance runners are quota gated.
#[derive(Debug, Clone, Default)]
pub struct RunnerPool {
    instance: Vec<RunnerMatcher>,
    private: Vec<RunnerMatcher>,
}

impl RunnerPool {
    pub fn new(matchers: impl IntoIterator<Item = RunnerMatcher>) -> Self {
        let (instance, private): (Vec<_>, Vec<_>) = RunnerMatcher::deduplicate(matchers)
            .into_iter()
            .partition(RunnerMatcher::instance_type);

        Self { instance, private }
    }

    /// Builds the pool from stored records
    ///
    /// Fails on the first record missing a matching attribute.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a RunnerRecord>,
    ) -> Result<Self, ConfigurationError> {
        let matchers = records
            .into_iter()
            .map(RunnerMatcher::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(matchers))
    }

    pub fn instance_matchers(&self) -> &[RunnerMatcher] {
        &self.instance
    }

    /// Group and project matchers
    pub fn private_matchers(&self) -> &[RunnerMatcher] {
        &self.private
    }

    /// Number of distinct matchers
    pub fn len(&self) -> usize {
        self.instance.len() + self.private.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Admission decision for builds against a fixed pool
pub struct MatchingEngine {
    pool: RunnerPool,
    policy: Arc<dyn QuotaPolicy>,
}

impl MatchingEngine {
    pub fn new(pool: RunnerPool, policy: Arc<dyn QuotaPolicy>) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &RunnerPool {
        &self.pool
    }

    /// Classifies one build
    ///
    /// `CiQuotaExceeded` is only reported when an instance runner matched
    /// and the policy confirmed it is out of quota. A failed quota lookup
    /// counts as "not within quota" without that confirmation.
    pub fn evaluate(&self, build: &BuildMatcher) -> AdmissionResult {
        if self.pool.private.iter().any(|runner| runner.matches(build)) {
            return AdmissionResult::Admitted;
        }

        let mut quota_exceeded = false;

        for runner in self.pool.instance.iter().filter(|r| r.matches(build)) {
            match self.policy.matches_quota(runner, build) {
                Ok(true) => return AdmissionResult::Admitted,
                Ok(false) => quota_exceeded = true,
                Err(err) => {
                    warn!(
                        policy = self.policy.name(),
                        runners = ?runner.runner_ids(),
                        project_id = %build.project_id(),
                        "Quota evaluation failed: {}",
                        err
                    );
                }
            }
        }

        let reason = if quota_exceeded {
            DropReason::CiQuotaExceeded
        } else {
            DropReason::NoMatchingRunner
        };

        debug!(
            builds = build.build_ids().len(),
            tags = ?build.tag_list(),
            protected = build.protected(),
            "No eligible runner: {}",
            reason
        );

        AdmissionResult::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::quota::AlwaysAdmit;
    use tollgate_core::domain::build::Visibility;
    use tollgate_core::domain::runner::{AccessLevel, RunnerType};
    use tollgate_core::error::QuotaEvaluationError;
    use uuid::Uuid;

    /// Quota policy answering per runner, keyed by the runner's first id
    struct PerRunnerQuota(Vec<(&'static str, Result<bool, QuotaEvaluationError>)>);

    impl QuotaPolicy for PerRunnerQuota {
        fn matches_quota(
            &self,
            runner: &RunnerMatcher,
            _build: &BuildMatcher,
        ) -> Result<bool, QuotaEvaluationError> {
            self.0
                .iter()
                .find(|(id, _)| runner.runner_ids()[0] == *id)
                .map(|(_, answer)| answer.clone())
                .unwrap_or(Ok(true))
        }

        fn name(&self) -> &'static str {
            "per_runner"
        }
    }

    /// Quota policy answering the same for every pair
    struct FixedQuota(Result<bool, QuotaEvaluationError>);

    impl QuotaPolicy for FixedQuota {
        fn matches_quota(
            &self,
            _runner: &RunnerMatcher,
            _build: &BuildMatcher,
        ) -> Result<bool, QuotaEvaluationError> {
            self.0.clone()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn runner(id: &str, runner_type: RunnerType, tags: &[&str]) -> RunnerMatcher {
        RunnerMatcher::new(
            id,
            runner_type,
            1.0,
            1.0,
            true,
            AccessLevel::NotProtected,
            tags.iter().copied(),
        )
        .unwrap()
    }

    fn build(tags: &[&str]) -> BuildMatcher {
        BuildMatcher::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            false,
            tags.iter().copied(),
            Visibility::Private,
        )
    }

    fn engine(
        runners: Vec<RunnerMatcher>,
        quota: Result<bool, QuotaEvaluationError>,
    ) -> MatchingEngine {
        MatchingEngine::new(RunnerPool::new(runners), Arc::new(FixedQuota(quota)))
    }

    #[test]
    fn test_pool_partitions_and_deduplicates() {
        let pool = RunnerPool::new(vec![
            runner("a", RunnerType::Instance, &[]),
            runner("b", RunnerType::Instance, &[]),
            runner("c", RunnerType::Group, &[]),
            runner("d", RunnerType::Project, &["gpu"]),
        ]);

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.instance_matchers().len(), 1);
        assert_eq!(pool.instance_matchers()[0].runner_ids().len(), 2);
        assert_eq!(pool.private_matchers().len(), 2);
    }

    #[test]
    fn test_empty_pool_drops_with_no_matching_runner() {
        let engine = MatchingEngine::new(RunnerPool::default(), Arc::new(AlwaysAdmit));

        assert!(engine.pool().is_empty());
        assert_eq!(
            engine.evaluate(&build(&[])),
            AdmissionResult::Dropped(DropReason::NoMatchingRunner)
        );
    }

    #[test]
    fn test_instance_runner_within_quota_admits() {
        let engine = engine(vec![runner("a", RunnerType::Instance, &[])], Ok(true));
        assert_eq!(engine.evaluate(&build(&[])), AdmissionResult::Admitted);
    }

    #[test]
    fn test_instance_runner_out_of_quota_drops() {
        let engine = engine(vec![runner("a", RunnerType::Instance, &[])], Ok(false));
        assert_eq!(
            engine.evaluate(&build(&[])),
            AdmissionResult::Dropped(DropReason::CiQuotaExceeded)
        );
    }

    #[test]
    fn test_private_runner_bypasses_quota() {
        let engine = engine(
            vec![
                runner("a", RunnerType::Instance, &[]),
                runner("b", RunnerType::Project, &[]),
            ],
            Ok(false),
        );
        assert_eq!(engine.evaluate(&build(&[])), AdmissionResult::Admitted);
    }

    #[test]
    fn test_non_matching_private_runner_does_not_bypass() {
        let engine = engine(
            vec![
                runner("a", RunnerType::Instance, &["docker"]),
                runner("b", RunnerType::Group, &["gpu"]),
            ],
            Ok(false),
        );
        assert_eq!(
            engine.evaluate(&build(&["docker"])),
            AdmissionResult::Dropped(DropReason::CiQuotaExceeded)
        );
    }

    #[test]
    fn test_quota_error_is_not_quota_exceeded() {
        let engine = engine(
            vec![runner("a", RunnerType::Instance, &[])],
            Err(QuotaEvaluationError::LedgerUnavailable("timeout".to_string())),
        );
        assert_eq!(
            engine.evaluate(&build(&[])),
            AdmissionResult::Dropped(DropReason::NoMatchingRunner)
        );
    }

    #[test]
    fn test_quota_exhaustion_wins_over_quota_error() {
        let unavailable: Result<bool, _> =
            Err(QuotaEvaluationError::LedgerUnavailable("timeout".to_string()));

        for runners in [
            vec![
                runner("erroring", RunnerType::Instance, &["docker"]),
                runner("exhausted", RunnerType::Instance, &["docker", "linux"]),
            ],
            vec![
                runner("exhausted", RunnerType::Instance, &["docker", "linux"]),
                runner("erroring", RunnerType::Instance, &["docker"]),
            ],
        ] {
            let policy = PerRunnerQuota(vec![
                ("erroring", unavailable.clone()),
                ("exhausted", Ok(false)),
            ]);
            let engine = MatchingEngine::new(RunnerPool::new(runners), Arc::new(policy));

            assert_eq!(engine.pool().instance_matchers().len(), 2);
            assert_eq!(
                engine.evaluate(&build(&["docker"])),
                AdmissionResult::Dropped(DropReason::CiQuotaExceeded)
            );
        }
    }

    #[test]
    fn test_from_records_rejects_incomplete_runner() {
        let record = RunnerRecord {
            id: "broken".to_string(),
            runner_type: Some(RunnerType::Instance),
            public_cost_factor: None,
            private_cost_factor: Some(1.0),
            run_untagged: Some(true),
            access_level: Some(AccessLevel::NotProtected),
            tag_list: Some(Vec::new()),
            active: true,
            contacted_at: None,
        };

        let err = RunnerPool::from_records([&record]).unwrap_err();
        assert_eq!(err, ConfigurationError::missing("broken", "public_cost_factor"));
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MatchingEngine>();
    }
}
