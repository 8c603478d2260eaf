//! Runner DTOs
//!
//! Runner records as stored by the fleet registry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::runner::{AccessLevel, RunnerMatcher, RunnerType};
use crate::error::ConfigurationError;

/// A persisted runner
///
/// Matching attributes are optional because storage may hold incomplete
/// rows; converting into a [`RunnerMatcher`] rejects those.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerRecord {
    /// Unique identifier for the runner
    pub id: String,

    pub runner_type: Option<RunnerType>,
    pub public_cost_factor: Option<f64>,
    pub private_cost_factor: Option<f64>,
    pub run_untagged: Option<bool>,
    pub access_level: Option<AccessLevel>,
    pub tag_list: Option<Vec<String>>,

    /// Paused runners are not part of the fleet
    #[serde(default = "default_active")]
    pub active: bool,

    /// Last time the runner contacted the coordinator
    #[serde(default)]
    pub contacted_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl RunnerRecord {
    /// Whether the runner contacted the coordinator within `timeout` of `now`
    pub fn is_online(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let Some(contacted_at) = self.contacted_at else {
            return false;
        };

        now.checked_sub_signed(timeout)
            .is_none_or(|cutoff| contacted_at > cutoff)
    }
}

impl TryFrom<&RunnerRecord> for RunnerMatcher {
    type Error = ConfigurationError;

    fn try_from(record: &RunnerRecord) -> Result<Self, Self::Error> {
        let missing = |attribute| ConfigurationError::missing(record.id.clone(), attribute);

        let runner_type = record.runner_type.ok_or_else(|| missing("runner_type"))?;
        let public_cost_factor = record
            .public_cost_factor
            .ok_or_else(|| missing("public_cost_factor"))?;
        let private_cost_factor = record
            .private_cost_factor
            .ok_or_else(|| missing("private_cost_factor"))?;
        let run_untagged = record.run_untagged.ok_or_else(|| missing("run_untagged"))?;
        let access_level = record.access_level.ok_or_else(|| missing("access_level"))?;
        let tag_list = record.tag_list.as_ref().ok_or_else(|| missing("tag_list"))?;

        RunnerMatcher::new(
            record.id.clone(),
            runner_type,
            public_cost_factor,
            private_cost_factor,
            run_untagged,
            access_level,
            tag_list.iter().cloned(),
        )
    }
}
