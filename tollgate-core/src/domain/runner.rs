//! Runner domain model
//!
//! A runner is an execution agent registered at instance, group or project
//! scope. [`RunnerMatcher`] holds the attributes that decide which builds a
//! runner could pick up.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::domain::build::{BuildMatcher, Visibility};
use crate::error::ConfigurationError;

/// Scope a runner is registered at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    /// Shared by every project on the instance, subject to quota
    Instance,

    /// Dedicated to the projects of one group
    Group,

    /// Dedicated to a single project
    Project,
}

impl RunnerType {
    pub fn is_instance(&self) -> bool {
        matches!(self, RunnerType::Instance)
    }
}

impl std::fmt::Display for RunnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerType::Instance => write!(f, "instance"),
            RunnerType::Group => write!(f, "group"),
            RunnerType::Project => write!(f, "project"),
        }
    }
}

/// Which refs a runner is allowed to run jobs for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Runs jobs for any ref
    NotProtected,

    /// Runs jobs for protected refs only
    RefProtected,
}

/// Matching snapshot of one or more runners
///
/// Runners sharing all six matching attributes collapse into one matcher
/// (see [`RunnerMatcher::deduplicate`]); `runner_ids` lists every member.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerMatcher {
    runner_ids: Vec<String>,
    runner_type: RunnerType,
    public_cost_factor: f64,
    private_cost_factor: f64,
    run_untagged: bool,
    access_level: AccessLevel,
    tag_list: BTreeSet<String>,
}

type MatcherKey = (RunnerType, u64, u64, bool, AccessLevel, BTreeSet<String>);

impl RunnerMatcher {
    /// Creates a matcher for a single runner
    ///
    /// Fails if a cost factor is negative or not finite.
    pub fn new<I, S>(
        runner_id: impl Into<String>,
        runner_type: RunnerType,
        public_cost_factor: f64,
        private_cost_factor: f64,
        run_untagged: bool,
        access_level: AccessLevel,
        tags: I,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let runner_id = runner_id.into();
        let public_cost_factor =
            validate_cost_factor(&runner_id, "public_cost_factor", public_cost_factor)?;
        let private_cost_factor =
            validate_cost_factor(&runner_id, "private_cost_factor", private_cost_factor)?;

        Ok(Self {
            runner_ids: vec![runner_id],
            runner_type,
            public_cost_factor,
            private_cost_factor,
            run_untagged,
            access_level,
            tag_list: tags.into_iter().map(Into::into).collect(),
        })
    }

    /// Collapses matchers with identical attributes, keeping first-seen order
    pub fn deduplicate(matchers: impl IntoIterator<Item = RunnerMatcher>) -> Vec<RunnerMatcher> {
        let mut index: HashMap<MatcherKey, usize> = HashMap::new();
        let mut unique: Vec<RunnerMatcher> = Vec::new();

        for matcher in matchers {
            match index.get(&matcher.key()) {
                Some(&slot) => unique[slot].runner_ids.extend(matcher.runner_ids),
                None => {
                    index.insert(matcher.key(), unique.len());
                    unique.push(matcher);
                }
            }
        }

        unique
    }

    /// Whether this runner could run the build, ignoring quota
    ///
    /// The protection gate is checked before tags.
    pub fn matches(&self, build: &BuildMatcher) -> bool {
        if self.ref_protected() && !build.protected() {
            return false;
        }

        self.accepting_tags(build)
    }

    /// Whether the runner's tags accept the build
    ///
    /// An untagged build needs `run_untagged`, even when the runner has no
    /// tags of its own.
    pub fn accepting_tags(&self, build: &BuildMatcher) -> bool {
        (self.run_untagged || build.has_tags()) && build.tag_list().is_subset(&self.tag_list)
    }

    pub fn instance_type(&self) -> bool {
        self.runner_type.is_instance()
    }

    pub fn ref_protected(&self) -> bool {
        self.access_level == AccessLevel::RefProtected
    }

    /// Cost factor charged for a build of the given visibility
    ///
    /// Only instance runners consume quota; group and project runners are
    /// always free.
    pub fn minutes_cost_factor(&self, visibility: Visibility) -> f64 {
        if !self.instance_type() {
            return 0.0;
        }

        match visibility {
            Visibility::Public => self.public_cost_factor,
            Visibility::Internal | Visibility::Private => self.private_cost_factor,
        }
    }

    pub fn runner_ids(&self) -> &[String] {
        &self.runner_ids
    }

    pub fn runner_type(&self) -> RunnerType {
        self.runner_type
    }

    pub fn public_cost_factor(&self) -> f64 {
        self.public_cost_factor
    }

    pub fn private_cost_factor(&self) -> f64 {
        self.private_cost_factor
    }

    pub fn run_untagged(&self) -> bool {
        self.run_untagged
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn tag_list(&self) -> &BTreeSet<String> {
        &self.tag_list
    }

    fn key(&self) -> MatcherKey {
        (
            self.runner_type,
            self.public_cost_factor.to_bits(),
            self.private_cost_factor.to_bits(),
            self.run_untagged,
            self.access_level,
            self.tag_list.clone(),
        )
    }
}

fn validate_cost_factor(
    runner_id: &str,
    attribute: &'static str,
    value: f64,
) -> Result<f64, ConfigurationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigurationError::InvalidCostFactor {
            runner_id: runner_id.to_string(),
            attribute,
            value,
        });
    }

    // -0.0 and 0.0 must dedup together
    Ok(if value == 0.0 { 0.0 } else { value })
}
