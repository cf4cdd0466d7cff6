// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule identifier and trigger specification.

use crate::job::{Priority, WorkflowId};
use crate::robot::RobotId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a schedule.
    pub struct ScheduleId("sch-");
}

/// Trigger cadence. `Monthly` is a documented 30-day approximation, not a
/// calendar month (see the original source it is ported from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Cron,
}

crate::simple_display! {
    Frequency {
        Once => "once",
        Hourly => "hourly",
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Cron => "cron",
    }
}

/// A schedule fires a workflow submission on its own cadence. `cron_
/// expression` is required iff `frequency == Cron`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub workflow_id: WorkflowId,
    pub robot_id: Option<RobotId>,
    pub frequency: Frequency,
    pub cron_expression: Option<String>,
    pub timezone: chrono_tz::Tz,
    pub enabled: bool,
    pub priority: Priority,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    pub run_count: u64,
    pub success_count: u64,
}

impl Schedule {
    pub fn new(
        name: impl Into<String>,
        workflow_id: WorkflowId,
        frequency: Frequency,
        priority: Priority,
    ) -> Self {
        Self {
            id: ScheduleId::new(),
            name: name.into(),
            workflow_id,
            robot_id: None,
            frequency,
            cron_expression: None,
            timezone: chrono_tz::UTC,
            enabled: true,
            priority,
            next_run: None,
            last_run: None,
            run_count: 0,
            success_count: 0,
        }
    }

    pub fn record_fired(&mut self, at: chrono::DateTime<chrono::Utc>, succeeded: bool) {
        self.last_run = Some(at);
        self.run_count += 1;
        if succeeded {
            self.success_count += 1;
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct ScheduleBuilder => Schedule {
        into {
            name: String = "test-schedule",
        }
        set {
            workflow_id: WorkflowId = WorkflowId::new(),
            robot_id: Option<RobotId> = None,
            frequency: Frequency = Frequency::Once,
            cron_expression: Option<String> = None,
            timezone: chrono_tz::Tz = chrono_tz::UTC,
            enabled: bool = true,
            priority: Priority = Priority::Normal,
            next_run: Option<chrono::DateTime<chrono::Utc>> = None,
            last_run: Option<chrono::DateTime<chrono::Utc>> = None,
            run_count: u64 = 0,
            success_count: u64 = 0,
        }
        computed {
            id: ScheduleId = ScheduleId::new(),
        }
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
