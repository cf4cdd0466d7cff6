// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Every tunable named across the engine's subsystems, collected onto one
//! struct so the daemon can load it from a single TOML file.

use serde::Deserialize;
use std::time::Duration;

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window within which two jobs with the same fingerprint are
    /// considered duplicates.
    #[serde(with = "duration_secs")]
    pub dedup_window: Duration,

    /// Job execution timeout applied when a job does not specify one.
    #[serde(with = "duration_secs")]
    pub default_job_timeout: Duration,

    /// How often the queue's timeout sweep runs.
    #[serde(with = "duration_secs")]
    pub timeout_check_interval: Duration,

    /// How often the distributor attempts to dispatch queued jobs.
    #[serde(with = "duration_secs")]
    pub dispatch_interval: Duration,

    /// Per-attempt wait for a robot to accept or reject a dispatched job.
    #[serde(with = "duration_secs")]
    pub dispatch_timeout: Duration,

    pub max_retries: u32,

    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,

    /// Window within which a late-fired schedule still runs.
    #[serde(with = "duration_secs")]
    pub misfire_grace: Duration,

    #[serde(with = "duration_secs")]
    pub heartbeat_timeout: Duration,

    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,
    pub error_rate_warning: f64,
    pub error_rate_critical: f64,

    #[serde(with = "duration_secs")]
    pub token_ttl: Duration,

    #[serde(with = "duration_secs")]
    pub rate_limit_window: Duration,
    pub rate_limit_requests: u32,

    pub max_distribution_history: usize,
    pub max_recovery_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_window: secs(5 * 60),
            default_job_timeout: secs(30 * 60),
            timeout_check_interval: secs(30),
            dispatch_interval: secs(1),
            dispatch_timeout: secs(10),
            max_retries: 3,
            retry_delay: secs(5),
            misfire_grace: secs(60),
            heartbeat_timeout: secs(90),
            cpu_warning: 80.0,
            cpu_critical: 95.0,
            memory_warning: 80.0,
            memory_critical: 95.0,
            disk_warning: 85.0,
            disk_critical: 95.0,
            error_rate_warning: 0.1,
            error_rate_critical: 0.25,
            token_ttl: secs(24 * 60 * 60),
            rate_limit_window: secs(60),
            rate_limit_requests: 100,
            max_distribution_history: 1000,
            max_recovery_history: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
