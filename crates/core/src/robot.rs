// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot identifier and record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::define_id! {
    /// Unique identifier for a robot (worker agent).
    pub struct RobotId("rbt-");
}

/// Robot connection/availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Offline,
    Online,
    Busy,
    Error,
    Maintenance,
}

crate::simple_display! {
    RobotStatus {
        Offline => "offline",
        Online => "online",
        Busy => "busy",
        Error => "error",
        Maintenance => "maintenance",
    }
}

/// A worker agent. `current_jobs <= max_concurrent_jobs` always holds;
/// `is_available` iff `status == Online && current_jobs < max_concurrent_jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
    pub status: RobotStatus,
    /// Routing tag, e.g. "production".
    pub environment: Option<String>,
    pub tags: BTreeSet<String>,
    pub max_concurrent_jobs: u32,
    pub current_jobs: u32,
    pub last_heartbeat: Option<chrono::DateTime<chrono::Utc>>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Robot {
    pub fn new(name: impl Into<String>, max_concurrent_jobs: u32) -> Self {
        Self {
            id: RobotId::new(),
            name: name.into(),
            status: RobotStatus::Offline,
            environment: None,
            tags: BTreeSet::new(),
            max_concurrent_jobs,
            current_jobs: 0,
            last_heartbeat: None,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            disk_percent: 0.0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == RobotStatus::Online && self.current_jobs < self.max_concurrent_jobs
    }

    pub fn utilization(&self) -> f64 {
        if self.max_concurrent_jobs == 0 {
            1.0
        } else {
            self.current_jobs as f64 / self.max_concurrent_jobs as f64
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct RobotBuilder => Robot {
        into {
            name: String = "test-robot",
        }
        set {
            status: RobotStatus = RobotStatus::Online,
            environment: Option<String> = None,
            tags: BTreeSet<String> = BTreeSet::new(),
            max_concurrent_jobs: u32 = 1,
            current_jobs: u32 = 0,
            last_heartbeat: Option<chrono::DateTime<chrono::Utc>> = None,
            cpu_percent: f64 = 0.0,
            memory_percent: f64 = 0.0,
            disk_percent: f64 = 0.0,
        }
        computed {
            id: RobotId = RobotId::new(),
        }
    }
}

#[cfg(test)]
#[path = "robot_tests.rs"]
mod tests;
