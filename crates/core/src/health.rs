// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-robot health record. Scoring (threshold evaluation, EMA update)
//! lives in the engine's health monitor; this is the plain data it
//! produces and consumes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

crate::simple_display! {
    HealthStatus {
        Unknown => "unknown",
        Healthy => "healthy",
        Degraded => "degraded",
        Unhealthy => "unhealthy",
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus::Unknown
    }
}

/// Rolling per-robot health record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub status: HealthStatus,
    /// EMA of response time in milliseconds: `new = 0.3*sample + 0.7*old`.
    pub response_time_ema_ms: f64,
    pub error_count: u64,
    pub request_count: u64,
    pub last_heartbeat: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            response_time_ema_ms: 0.0,
            error_count: 0,
            request_count: 0,
            last_heartbeat: None,
        }
    }
}

impl HealthMetrics {
    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64
        }
    }

    pub fn record_response_time(&mut self, sample_ms: f64) {
        self.response_time_ema_ms = 0.3 * sample_ms + 0.7 * self.response_time_ema_ms;
    }
}
