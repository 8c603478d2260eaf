//! Admission configuration
//!
//! Tunables for the admission pass: which quota policy gates shared
//! runners, how fresh a runner's last contact must be for it to count as
//! part of the fleet, and the overall deadline of a pass.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quota policy applied to instance runners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaPolicyKind {
    /// Every runner is within quota
    #[default]
    AlwaysAdmit,

    /// Cost factor aware, backed by a usage ledger
    CostFactor,
}

impl std::str::FromStr for QuotaPolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always_admit" => Ok(QuotaPolicyKind::AlwaysAdmit),
            "cost_factor" => Ok(QuotaPolicyKind::CostFactor),
            other => anyhow::bail!("unknown quota policy: {}", other),
        }
    }
}

/// Admission configuration
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// When false, passes return without looking at the pipeline
    pub enabled: bool,

    /// Quota policy for instance runners
    pub quota_policy: QuotaPolicyKind,

    /// Runners silent for longer than this are left out of the pool
    pub runner_online_timeout: Duration,

    /// Upper bound for one pass when run with a deadline
    pub pass_timeout: Duration,
}

impl AdmissionConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            enabled: true,
            quota_policy: QuotaPolicyKind::AlwaysAdmit,
            runner_online_timeout: Duration::from_secs(2 * 60 * 60),
            pass_timeout: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables, all optional:
    /// - TOLLGATE_ADMISSION_ENABLED (true/false, default: true)
    /// - TOLLGATE_QUOTA_POLICY (always_admit/cost_factor, default: always_admit)
    /// - TOLLGATE_RUNNER_ONLINE_TIMEOUT (seconds, default: 7200)
    /// - TOLLGATE_PASS_TIMEOUT (seconds, default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::new();

        let enabled = match lookup("TOLLGATE_ADMISSION_ENABLED") {
            Some(value) => value.trim().parse::<bool>().map_err(|_| {
                anyhow::anyhow!("TOLLGATE_ADMISSION_ENABLED must be true or false, got {value}")
            })?,
            None => defaults.enabled,
        };

        let quota_policy = match lookup("TOLLGATE_QUOTA_POLICY") {
            Some(value) => value.parse()?,
            None => defaults.quota_policy,
        };

        let runner_online_timeout = parse_secs(
            &lookup,
            "TOLLGATE_RUNNER_ONLINE_TIMEOUT",
            defaults.runner_online_timeout,
        )?;
        let pass_timeout = parse_secs(&lookup, "TOLLGATE_PASS_TIMEOUT", defaults.pass_timeout)?;

        let config = Self {
            enabled,
            quota_policy,
            runner_online_timeout,
            pass_timeout,
        };
        config.validate()?;

        Ok(config)
    }

    /// Sets the quota policy
    pub fn with_quota_policy(mut self, kind: QuotaPolicyKind) -> Self {
        self.quota_policy = kind;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runner_online_timeout.is_zero() {
            anyhow::bail!("runner_online_timeout must be greater than 0");
        }

        if self.pass_timeout.is_zero() {
            anyhow::bail!("pass_timeout must be greater than 0");
        }

        Ok(())
    }
}

/// Reads a whole number of seconds, falling back to `default` when unset
fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| anyhow::anyhow!("{key} must be a whole number of seconds, got {value}")),
        None => Ok(default),
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::new()
    }
}
