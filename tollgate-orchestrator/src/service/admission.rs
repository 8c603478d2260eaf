//! Admission Service
//!
//! Runs the matching engine over every build of a freshly created pipeline
//! and drops the builds no runner in the fleet could ever pick up.
//!
//! A pass is advisory: it neither reserves runners nor consumes quota.
//! Admitted builds are left untouched for the regular queueing path.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tollgate_core::domain::admission::{AdmissionResult, DropReason};
use tollgate_core::domain::build::BuildMatcher;
use tollgate_core::dto::build::BuildRecord;
use tollgate_core::error::ConfigurationError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AdmissionConfig;
use crate::repository::{
    BuildSnapshotProvider, DropRecorder, RepositoryError, RunnerSnapshotProvider,
};
use crate::service::matching::{MatchingEngine, RunnerPool};
use crate::service::quota::{QuotaPolicy, UsageLedger, policy_for};

/// Errors that abort a whole pass
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// A runner of the fleet could not be snapshotted
    #[error("invalid runner configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Builds or runners could not be loaded
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The pass did not finish within the configured deadline
    #[error("admission pass exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

pub type Result<T> = std::result::Result<T, AdmissionError>;

/// A build dropped by the pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedBuild {
    pub build_id: Uuid,
    pub reason: DropReason,
}

/// A drop decision the recorder failed to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDrop {
    pub build_id: Uuid,
    pub reason: DropReason,
    pub error: String,
}

/// Outcome of one pass, sorted by build id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionReport {
    pub pipeline_id: Uuid,
    pub admitted: Vec<Uuid>,
    pub dropped: Vec<DroppedBuild>,
    pub failed_drops: Vec<FailedDrop>,
}

impl AdmissionReport {
    fn empty(pipeline_id: Uuid) -> Self {
        Self {
            pipeline_id,
            admitted: Vec::new(),
            dropped: Vec::new(),
            failed_drops: Vec::new(),
        }
    }

    /// Classification of a build, whether or not its drop was persisted
    pub fn result_for(&self, build_id: Uuid) -> Option<AdmissionResult> {
        if self.admitted.contains(&build_id) {
            return Some(AdmissionResult::Admitted);
        }

        self.dropped
            .iter()
            .map(|d| (d.build_id, d.reason))
            .chain(self.failed_drops.iter().map(|f| (f.build_id, f.reason)))
            .find(|(id, _)| *id == build_id)
            .map(|(_, reason)| AdmissionResult::Dropped(reason))
    }

    /// Number of builds classified by the pass
    pub fn evaluated(&self) -> usize {
        self.admitted.len() + self.dropped.len() + self.failed_drops.len()
    }
}

/// Orchestrates admission passes
pub struct AdmissionService {
    config: AdmissionConfig,
    runners: Arc<dyn RunnerSnapshotProvider>,
    builds: Arc<dyn BuildSnapshotProvider>,
    recorder: Arc<dyn DropRecorder>,
    policy: Arc<dyn QuotaPolicy>,
}

impl AdmissionService {
    pub fn new(
        config: AdmissionConfig,
        runners: Arc<dyn RunnerSnapshotProvider>,
        builds: Arc<dyn BuildSnapshotProvider>,
        recorder: Arc<dyn DropRecorder>,
        policy: Arc<dyn QuotaPolicy>,
    ) -> Self {
        Self {
            config,
            runners,
            builds,
            recorder,
            policy,
        }
    }

    /// Creates a service using the quota policy named by the configuration
    pub fn from_config(
        config: AdmissionConfig,
        runners: Arc<dyn RunnerSnapshotProvider>,
        builds: Arc<dyn BuildSnapshotProvider>,
        recorder: Arc<dyn DropRecorder>,
        ledger: Arc<dyn UsageLedger>,
    ) -> Self {
        let policy = policy_for(config.quota_policy, ledger);
        Self::new(config, runners, builds, recorder, policy)
    }

    /// Runs a pass bounded by `config.pass_timeout`
    ///
    /// Drops already written when the deadline fires stay written.
    pub async fn execute_with_deadline(&self, pipeline_id: Uuid) -> Result<AdmissionReport> {
        let deadline = self.config.pass_timeout;

        tokio::time::timeout(deadline, self.execute(pipeline_id))
            .await
            .map_err(|_| AdmissionError::DeadlineExceeded(deadline))?
    }

    /// Runs one admission pass over the pipeline
    ///
    /// Fails only when builds or runners cannot be loaded or a runner is
    /// malformed. Drops the recorder fails to persist are reported in
    /// [`AdmissionReport::failed_drops`] without stopping the pass.
    pub async fn execute(&self, pipeline_id: Uuid) -> Result<AdmissionReport> {
        if !self.config.enabled {
            debug!("Admission disabled, skipping pipeline {}", pipeline_id);
            return Ok(AdmissionReport::empty(pipeline_id));
        }

        let records = self.builds.builds_for_pipeline(pipeline_id).await?;
        let candidates: Vec<&BuildRecord> =
            records.iter().filter(|b| b.needs_admission()).collect();

        if candidates.is_empty() {
            debug!("Pipeline {} has no builds awaiting admission", pipeline_id);
            return Ok(AdmissionReport::empty(pipeline_id));
        }

        let matchers = BuildMatcher::group(candidates.iter().copied());
        let project_ids: BTreeSet<Uuid> = matchers.iter().map(BuildMatcher::project_id).collect();

        // Every pool is loaded before the first drop is written
        let mut engines: Vec<(Uuid, MatchingEngine)> = Vec::with_capacity(project_ids.len());
        for project_id in project_ids {
            let pool = self.load_pool(project_id).await?;
            engines.push((project_id, MatchingEngine::new(pool, self.policy.clone())));
        }

        let mut report = AdmissionReport::empty(pipeline_id);

        for (project_id, engine) in &engines {
            for matcher in matchers.iter().filter(|m| m.project_id() == *project_id) {
                match engine.evaluate(matcher) {
                    AdmissionResult::Admitted => {
                        report.admitted.extend_from_slice(matcher.build_ids())
                    }
                    AdmissionResult::Dropped(reason) => {
                        self.drop_builds(matcher.build_ids(), reason, &mut report)
                            .await
                    }
                }
            }
        }

        report.admitted.sort();
        report.dropped.sort_by_key(|d| d.build_id);
        report.failed_drops.sort_by_key(|f| f.build_id);

        info!(
            pipeline_id = %pipeline_id,
            policy = self.policy.name(),
            admitted = report.admitted.len(),
            dropped = report.dropped.len(),
            failed_drops = report.failed_drops.len(),
            "Admission pass completed"
        );

        Ok(report)
    }

    /// Snapshots the active, online runners available to a project
    async fn load_pool(&self, project_id: Uuid) -> Result<RunnerPool> {
        let records = self.runners.runners_for_project(project_id).await?;

        let now = Utc::now();
        let timeout = chrono::Duration::from_std(self.config.runner_online_timeout)
            .unwrap_or(chrono::Duration::MAX);

        let eligible: Vec<_> = records
            .iter()
            .filter(|r| r.active && r.is_online(now, timeout))
            .collect();

        if eligible.len() < records.len() {
            debug!(
                project_id = %project_id,
                "Ignoring {} paused or offline runner(s)",
                records.len() - eligible.len()
            );
        }

        let pool = RunnerPool::from_records(eligible)?;

        debug!(
            project_id = %project_id,
            instance = pool.instance_matchers().len(),
            private = pool.private_matchers().len(),
            "Runner pool loaded"
        );

        Ok(pool)
    }

    async fn drop_builds(
        &self,
        build_ids: &[Uuid],
        reason: DropReason,
        report: &mut AdmissionReport,
    ) {
        for &build_id in build_ids {
            match self.recorder.drop_build(build_id, reason).await {
                Ok(()) => {
                    info!(build_id = %build_id, "Build dropped: {}", reason);
                    report.dropped.push(DroppedBuild { build_id, reason });
                }
                Err(err) => {
                    warn!(build_id = %build_id, "Failed to drop build ({}): {}", reason, err);
                    report.failed_drops.push(FailedDrop {
                        build_id,
                        reason,
                        error: err.to_string(),
                    });
                }
            }
        }
    }
}
