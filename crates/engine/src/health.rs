// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scores robot health from heartbeats and request outcomes. Fires
//! `on_health_change` once per status transition and `on_robot_unhealthy`
//! once each time a robot newly becomes `UNHEALTHY`.

use orc_core::{Clock, HealthMetrics, HealthStatus, RobotId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,
    pub error_rate_warning: f64,
    pub error_rate_critical: f64,
    pub heartbeat_timeout: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 80.0,
            cpu_critical: 95.0,
            memory_warning: 80.0,
            memory_critical: 95.0,
            disk_warning: 85.0,
            disk_critical: 95.0,
            error_rate_warning: 0.1,
            error_rate_critical: 0.25,
            heartbeat_timeout: Duration::from_secs(90),
        }
    }
}

struct Tracked {
    metrics: HealthMetrics,
    cpu_percent: f64,
    memory_percent: f64,
    disk_percent: f64,
}

impl Default for Tracked {
    fn default() -> Self {
        Self { metrics: HealthMetrics::default(), cpu_percent: 0.0, memory_percent: 0.0, disk_percent: 0.0 }
    }
}

pub type HealthChangeCallback = Box<dyn Fn(RobotId, HealthStatus, HealthStatus) + Send + Sync>;
pub type RobotUnhealthyCallback = Box<dyn Fn(RobotId) + Send + Sync>;

pub struct HealthMonitor<C: Clock> {
    clock: C,
    thresholds: HealthThresholds,
    tracked: Mutex<HashMap<RobotId, Tracked>>,
    on_health_change: Option<HealthChangeCallback>,
    on_robot_unhealthy: Option<RobotUnhealthyCallback>,
}

impl<C: Clock> HealthMonitor<C> {
    pub fn new(clock: C, thresholds: HealthThresholds) -> Self {
        Self {
            clock,
            thresholds,
            tracked: Mutex::new(HashMap::new()),
            on_health_change: None,
            on_robot_unhealthy: None,
        }
    }

    pub fn with_callbacks(
        mut self,
        on_health_change: HealthChangeCallback,
        on_robot_unhealthy: RobotUnhealthyCallback,
    ) -> Self {
        self.on_health_change = Some(on_health_change);
        self.on_robot_unhealthy = Some(on_robot_unhealthy);
        self
    }

    fn compute_status(&self, t: &Tracked) -> HealthStatus {
        if t.metrics.last_heartbeat.is_none() {
            return HealthStatus::Unknown;
        }

        let now = self.clock.now_utc();
        let timed_out = t
            .metrics
            .last_heartbeat
            .map(|last| (now - last).to_std().unwrap_or(Duration::ZERO) > self.thresholds.heartbeat_timeout)
            .unwrap_or(false);

        let error_rate = t.metrics.error_rate();
        let th = &self.thresholds;

        let critical = timed_out
            || t.cpu_percent >= th.cpu_critical
            || t.memory_percent >= th.memory_critical
            || t.disk_percent >= th.disk_critical
            || error_rate >= th.error_rate_critical;
        if critical {
            return HealthStatus::Unhealthy;
        }

        let warning = t.cpu_percent >= th.cpu_warning
            || t.memory_percent >= th.memory_warning
            || t.disk_percent >= th.disk_warning
            || error_rate >= th.error_rate_warning;
        if warning {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }

    fn notify_if_changed(&self, robot_id: RobotId, old: HealthStatus, new: HealthStatus) {
        if old == new {
            return;
        }
        if let Some(cb) = &self.on_health_change {
            cb(robot_id, old, new);
        }
        if new == HealthStatus::Unhealthy {
            if let Some(cb) = &self.on_robot_unhealthy {
                cb(robot_id);
            }
        }
    }

    /// Updates resource percentages and heartbeat timestamp, recomputes
    /// status, and fires callbacks on transition. Returns the new status.
    pub fn record_heartbeat(
        &self,
        robot_id: RobotId,
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
    ) -> HealthStatus {
        let mut tracked = self.tracked.lock();
        let entry = tracked.entry(robot_id).or_default();
        let old = entry.metrics.status;

        entry.cpu_percent = cpu_percent;
        entry.memory_percent = memory_percent;
        entry.disk_percent = disk_percent;
        entry.metrics.last_heartbeat = Some(self.clock.now_utc());

        let new = self.compute_status(entry);
        entry.metrics.status = new;
        drop(tracked);

        self.notify_if_changed(robot_id, old, new);
        new
    }

    /// Records a completed request for error-rate and response-time
    /// tracking, recomputes status, and fires callbacks on transition.
    pub fn record_request(&self, robot_id: RobotId, succeeded: bool, response_time_ms: f64) -> HealthStatus {
        let mut tracked = self.tracked.lock();
        let entry = tracked.entry(robot_id).or_default();
        let old = entry.metrics.status;

        entry.metrics.request_count += 1;
        if !succeeded {
            entry.metrics.error_count += 1;
        }
        entry.metrics.record_response_time(response_time_ms);

        let new = self.compute_status(entry);
        entry.metrics.status = new;
        drop(tracked);

        self.notify_if_changed(robot_id, old, new);
        new
    }

    /// Periodic sweep: re-evaluates every tracked robot (primarily to
    /// catch heartbeat-timeout expiry) and returns those that newly
    /// transitioned to `UNHEALTHY`.
    pub fn sweep(&self) -> Vec<RobotId> {
        let mut newly_unhealthy = Vec::new();
        let mut tracked = self.tracked.lock();
        let ids: Vec<RobotId> = tracked.keys().copied().collect();
        for robot_id in ids {
            let Some(entry) = tracked.get_mut(&robot_id) else { continue };
            let old = entry.metrics.status;
            let new = self.compute_status(entry);
            entry.metrics.status = new;
            if old != new {
                if new == HealthStatus::Unhealthy {
                    newly_unhealthy.push(robot_id);
                }
                self.notify_if_changed(robot_id, old, new);
            }
        }
        newly_unhealthy
    }

    pub fn metrics(&self, robot_id: RobotId) -> Option<HealthMetrics> {
        self.tracked.lock().get(&robot_id).map(|t| t.metrics.clone())
    }

    pub fn forget(&self, robot_id: RobotId) {
        self.tracked.lock().remove(&robot_id);
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
