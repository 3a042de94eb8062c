//! nodepool.toml configuration parser.
//!
//! Every field is optional. `FleetConfig::resolve` validates the file and
//! produces the `Settings` the rest of the workspace consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::catalog::InstanceCatalog;
use crate::error::{FleetError, FleetResult};
use crate::types::InstanceCapacity;

/// Tag the scaling group stamps on every instance it launches.
pub const DEFAULT_GROUP_TAG: &str = "aws:autoscaling:groupName";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    pub cluster: Option<ClusterConfig>,
    pub replacement: Option<ReplacementConfig>,
    pub retry: Option<RetryConfig>,
    pub instance_types: Option<HashMap<String, InstanceCapacity>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub group_tag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplacementConfig {
    pub member_poll_interval: Option<String>,
    pub member_timeout: Option<String>,
    pub drain_warmup: Option<String>,
    pub drain_poll_interval: Option<String>,
    pub drain_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff: Option<String>,
    pub max_backoff: Option<String>,
}

/// Timing of the replacement state machine's waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplacementTiming {
    /// Interval between scaling group member polls.
    pub member_poll_interval: Duration,
    /// Upper bound on waiting for replacement members.
    pub member_timeout: Duration,
    /// Pause after each termination before polling pending tasks.
    pub drain_warmup: Duration,
    /// Interval between pending-task polls.
    pub drain_poll_interval: Duration,
    /// Upper bound on one node's drain wait.
    pub drain_timeout: Duration,
}

impl Default for ReplacementTiming {
    fn default() -> Self {
        Self {
            member_poll_interval: Duration::from_secs(15),
            member_timeout: Duration::from_secs(30 * 60),
            drain_warmup: Duration::from_secs(120),
            drain_poll_interval: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Exponential backoff for transient collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Validated settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub group_tag: String,
    pub replacement: ReplacementTiming,
    pub retry: RetryPolicy,
    pub catalog: InstanceCatalog,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            group_tag: DEFAULT_GROUP_TAG.to_string(),
            replacement: ReplacementTiming::default(),
            retry: RetryPolicy::default(),
            catalog: InstanceCatalog::builtin(),
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply defaults and validate.
    pub fn resolve(&self) -> FleetResult<Settings> {
        let defaults = Settings::default();

        let group_tag = self
            .cluster
            .as_ref()
            .and_then(|c| c.group_tag.clone())
            .unwrap_or(defaults.group_tag);
        if group_tag.trim().is_empty() {
            return Err(FleetError::Config("cluster.group_tag must not be empty".into()));
        }

        let replacement = match &self.replacement {
            Some(r) => {
                let d = defaults.replacement;
                ReplacementTiming {
                    member_poll_interval: positive(
                        "replacement.member_poll_interval",
                        r.member_poll_interval.as_deref(),
                        d.member_poll_interval,
                    )?,
                    member_timeout: positive(
                        "replacement.member_timeout",
                        r.member_timeout.as_deref(),
                        d.member_timeout,
                    )?,
                    drain_warmup: duration_field(
                        "replacement.drain_warmup",
                        r.drain_warmup.as_deref(),
                        d.drain_warmup,
                    )?,
                    drain_poll_interval: positive(
                        "replacement.drain_poll_interval",
                        r.drain_poll_interval.as_deref(),
                        d.drain_poll_interval,
                    )?,
                    drain_timeout: positive(
                        "replacement.drain_timeout",
                        r.drain_timeout.as_deref(),
                        d.drain_timeout,
                    )?,
                }
            }
            None => defaults.replacement,
        };

        let retry = match &self.retry {
            Some(r) => {
                let d = defaults.retry;
                let max_attempts = r.max_attempts.unwrap_or(d.max_attempts);
                if max_attempts == 0 {
                    return Err(FleetError::Config("retry.max_attempts must be at least 1".into()));
                }
                let initial_backoff =
                    duration_field("retry.initial_backoff", r.initial_backoff.as_deref(), d.initial_backoff)?;
                let max_backoff =
                    duration_field("retry.max_backoff", r.max_backoff.as_deref(), d.max_backoff)?;
                if max_backoff < initial_backoff {
                    return Err(FleetError::Config(
                        "retry.max_backoff must not be shorter than retry.initial_backoff".into(),
                    ));
                }
                RetryPolicy {
                    max_attempts,
                    initial_backoff,
                    max_backoff,
                }
            }
            None => defaults.retry,
        };

        let mut catalog = defaults.catalog;
        if let Some(types) = &self.instance_types {
            for (name, capacity) in types {
                if capacity.memory == 0 || capacity.cpu == 0 {
                    return Err(FleetError::Config(format!(
                        "instance_types.\"{name}\" needs non-zero memory and cpu"
                    )));
                }
                catalog.insert(name, *capacity);
            }
        }

        Ok(Settings {
            group_tag,
            replacement,
            retry,
            catalog,
        })
    }
}

fn duration_field(field: &str, raw: Option<&str>, default: Duration) -> FleetResult<Duration> {
    match raw {
        Some(s) => parse_duration(s)
            .ok_or_else(|| FleetError::Config(format!("{field}: invalid duration {s:?}"))),
        None => Ok(default),
    }
}

fn positive(field: &str, raw: Option<&str>, default: Duration) -> FleetResult<Duration> {
    let value = duration_field(field, raw, default)?;
    if value.is_zero() {
        return Err(FleetError::Config(format!("{field} must be greater than zero")));
    }
    Ok(value)
}

/// Parse a duration string like "250ms", "30s", "5m", "1h".
///
/// Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.trim().parse::<u64>().ok()?.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
